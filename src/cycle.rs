use std::cell::OnceCell;
use std::collections::{HashSet, VecDeque};
use std::hash::{Hash, Hasher};

use indexmap::IndexSet;

use crate::model::{Diagram, Id, Role};

/// A dependency cycle: an ordered, rotation-invariant sequence of
/// distinct class identifiers. `[A, B, C]` and `[B, C, A]` are the
/// same cycle; `[C, B, A]` (the reversal) is not.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub classes: Vec<Id>,
}

impl Cycle {
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Comma-joined class names in traversal order, for display and
    /// for the lexicographic ordering used in textual output.
    pub fn repr(&self, diagram: &Diagram) -> String {
        self.classes
            .iter()
            .map(|id| diagram.class(id).map(|c| c.name.as_str()).unwrap_or(id.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn is_rotation_of(&self, other: &Cycle) -> bool {
        let n = self.classes.len();
        if n != other.classes.len() {
            return false;
        }
        if n == 0 {
            return true;
        }
        let mut doubled = other.classes.clone();
        doubled.extend(other.classes.iter().cloned());
        (0..n).any(|i| doubled[i..i + n] == self.classes[..])
    }
}

impl PartialEq for Cycle {
    fn eq(&self, other: &Self) -> bool {
        self.is_rotation_of(other)
    }
}

impl Eq for Cycle {}

impl Hash for Cycle {
    /// Commutative fold so the hash is invariant under rotation: any
    /// order-sensitive combiner would break set membership, since
    /// `Eq` already treats rotations as equal.
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut folded: u64 = 0;
        for id in &self.classes {
            let mut h = std::collections::hash_map::DefaultHasher::new();
            id.hash(&mut h);
            folded ^= h.finish();
        }
        folded.hash(state);
    }
}

/// Finds dependency cycles by breadth-first search from every class,
/// over the union of all relationship kinds. Results are memoised on
/// first access.
pub struct CycleFinder<'d> {
    diagram: &'d Diagram,
    cache: OnceCell<IndexSet<Cycle>>,
}

impl<'d> CycleFinder<'d> {
    pub fn new(diagram: &'d Diagram) -> Self {
        CycleFinder {
            diagram,
            cache: OnceCell::new(),
        }
    }

    pub fn cycles(&self) -> &IndexSet<Cycle> {
        self.cache.get_or_init(|| {
            let mut found: IndexSet<Cycle> = IndexSet::new();
            for class in self.diagram.classes(false) {
                for path in self.search_from(&class.id) {
                    found.insert(Cycle { classes: path });
                }
            }
            found
        })
    }

    /// BFS from `root`, following outgoing relationships of every
    /// kind. The goal (reaching `root` again) is checked before the
    /// closed-set lookup, so a path that both revisits a closed class
    /// and happens to be the goal is still reported.
    fn search_from(&self, root: &Id) -> Vec<Vec<Id>> {
        let mut solutions = Vec::new();
        let mut queue: VecDeque<Vec<Id>> = VecDeque::new();
        let mut closed: HashSet<Id> = HashSet::new();

        for child in self.diagram.related_classes(root, None, Role::Lhs, None) {
            queue.push_back(vec![root.clone(), child.id.clone()]);
        }

        while let Some(path) = queue.pop_front() {
            let current = path.last().expect("path is never empty").clone();
            if &current == root {
                let mut cyc = path;
                cyc.pop();
                if !cyc.is_empty() {
                    solutions.push(cyc);
                }
                continue;
            }
            if closed.contains(&current) {
                continue;
            }
            closed.insert(current.clone());
            for child in self.diagram.related_classes(&current, None, Role::Lhs, None) {
                let mut next = path.clone();
                next.push(child.id.clone());
                queue.push_back(next);
            }
        }

        solutions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RelKind, Relationship};

    fn add_dep(d: &mut Diagram, id: &str, from: &str, to: &str) {
        d.add_relationship(Relationship {
            id: id.into(),
            kind: RelKind::Dependency,
            from_cls: from.into(),
            to_cls: to.into(),
            stereotypes: vec![],
            aggregation: None,
            from_mult: None,
            to_mult: None,
        })
        .unwrap();
    }

    #[test]
    fn finds_three_class_cycle() {
        let mut d = Diagram::new();
        for n in ["A", "B", "C"] {
            d.add_class(n.into(), n.into(), false, None).unwrap();
        }
        add_dep(&mut d, "r1", "A", "B");
        add_dep(&mut d, "r2", "B", "C");
        add_dep(&mut d, "r3", "C", "A");

        let finder = CycleFinder::new(&d);
        let cycles = finder.cycles();
        assert_eq!(cycles.len(), 1);
        let found = cycles.iter().next().unwrap();
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn rotations_are_the_same_cycle_but_reversal_is_not() {
        let abc = Cycle { classes: vec!["A".into(), "B".into(), "C".into()] };
        let bca = Cycle { classes: vec!["B".into(), "C".into(), "A".into()] };
        let cba = Cycle { classes: vec!["C".into(), "B".into(), "A".into()] };
        assert_eq!(abc, bca);
        assert_ne!(abc, cba);
    }

    #[test]
    fn self_loop_yields_single_class_cycle() {
        let mut d = Diagram::new();
        d.add_class("A".into(), "A".into(), false, None).unwrap();
        add_dep(&mut d, "r1", "A", "A");

        let finder = CycleFinder::new(&d);
        let cycles = finder.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles.iter().next().unwrap().classes, vec!["A".to_string()]);
    }

    #[test]
    fn cycles_are_memoised() {
        let mut d = Diagram::new();
        for n in ["A", "B"] {
            d.add_class(n.into(), n.into(), false, None).unwrap();
        }
        add_dep(&mut d, "r1", "A", "B");
        add_dep(&mut d, "r2", "B", "A");

        let finder = CycleFinder::new(&d);
        let first: Vec<_> = finder.cycles().iter().cloned().map(|c| c.classes).collect();
        let second: Vec<_> = finder.cycles().iter().cloned().map(|c| c.classes).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn no_cycle_among_unrelated_classes() {
        let mut d = Diagram::new();
        for n in ["A", "B"] {
            d.add_class(n.into(), n.into(), false, None).unwrap();
        }
        let finder = CycleFinder::new(&d);
        assert!(finder.cycles().is_empty());
    }
}
