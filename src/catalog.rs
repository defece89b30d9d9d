use crate::error::{Result, SimError};
use crate::event::{
    Binding, Bridge, Complex, Dissociation, EffectorDeath, Event, EventKind, Formation,
    Internalization, Species, TargetBirth,
};
use crate::state::{Layout, State};
use std::collections::BTreeMap;

/// Immutable set of every event for one pair of receptor capacities.
///
/// Besides the events themselves the catalog keeps, for each event, the
/// indices of the events whose rate may change when it fires.
#[derive(Debug)]
pub struct Catalog {
    layout: Layout,
    events: Vec<Box<dyn Event>>,
    affected: Vec<Vec<usize>>,
}

impl Catalog {
    /// Build the catalog for `e_receptors` effector and `t_receptors` target receptors.
    pub fn new(e_receptors: usize, t_receptors: usize) -> Self {
        let mut events: Vec<Box<dyn Event>> = Vec::new();

        for occ in 0..=e_receptors {
            events.push(Box::new(EffectorDeath::new(occ)));
            events.push(Box::new(Binding::new(Species::Effector, occ, e_receptors)));
            events.push(Box::new(Internalization::new(Species::Effector, occ)));
        }
        for occ in 0..=t_receptors {
            events.push(Box::new(TargetBirth::new(occ)));
            events.push(Box::new(Binding::new(Species::Target, occ, t_receptors)));
            events.push(Box::new(Internalization::new(Species::Target, occ)));
        }

        for e_occ in 0..=e_receptors {
            for t_occ in 0..=t_receptors {
                for bridge in [Bridge::EffectorSide, Bridge::TargetSide, Bridge::Free] {
                    events.push(Box::new(Formation::new(
                        bridge,
                        e_occ,
                        t_occ,
                        e_receptors,
                        t_receptors,
                    )));
                }
            }
        }

        for e_occ in 0..e_receptors {
            for t_occ in 0..t_receptors {
                events.push(Box::new(Dissociation::new(Complex::Trimer, e_occ, t_occ)));
                events.push(Box::new(Dissociation::new(Complex::Dimer, e_occ, t_occ)));
            }
        }

        Self::from_events(Layout::new(e_receptors, t_receptors), events)
    }

    /// Wrap an arbitrary event list, computing its dependency index.
    pub fn from_events(layout: Layout, events: Vec<Box<dyn Event>>) -> Self {
        // Slots outside the layout belong to boundary events that never fire.
        let mut readers = vec![Vec::new(); layout.len()];
        for (i_evt, event) in events.iter().enumerate() {
            for slot in event.reads() {
                if let Some(idx) = layout.flat(slot) {
                    readers[idx].push(i_evt);
                }
            }
        }

        let affected = events
            .iter()
            .map(|event| {
                let mut deps: Vec<usize> = event
                    .writes()
                    .into_iter()
                    .filter_map(|slot| layout.flat(slot))
                    .flat_map(|idx| readers[idx].iter().copied())
                    .collect();
                deps.sort_unstable();
                deps.dedup();
                deps
            })
            .collect();

        Self {
            layout,
            events,
            affected,
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Box<dyn Event>] {
        &self.events
    }

    /// Indices of the events whose rate may change when event `i_evt` fires.
    pub fn affected_by(&self, i_evt: usize) -> &[usize] {
        &self.affected[i_evt]
    }

    /// Number of events of each kind.
    pub fn count_by_kind(&self) -> BTreeMap<EventKind, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Fail unless `state` was built for this catalog's receptor capacities.
    pub fn check_state(&self, state: &State) -> Result<()> {
        if state.layout() != self.layout {
            return Err(SimError::ShapeMismatch {
                expected: self.layout.shape(),
                found: state.shape(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Slot;

    fn expected_len(e: usize, t: usize) -> usize {
        3 * (e + 1) + 3 * (t + 1) + 3 * (e + 1) * (t + 1) + 2 * e * t
    }

    #[test]
    fn catalog_for_two_by_two() {
        let catalog = Catalog::new(2, 2);
        let counts = catalog.count_by_kind();
        for kind in [
            EventKind::EffectorDeath,
            EventKind::EffectorBinding,
            EventKind::EffectorInternalization,
            EventKind::TargetBirth,
            EventKind::TargetBinding,
            EventKind::TargetInternalization,
        ] {
            assert_eq!(counts[&kind], 3, "{kind:?}");
        }
        for kind in [
            EventKind::EffectorSideFormation,
            EventKind::TargetSideFormation,
            EventKind::FreeFormation,
        ] {
            assert_eq!(counts[&kind], 9, "{kind:?}");
        }
        assert_eq!(counts[&EventKind::TrimerDissociation], 4);
        assert_eq!(counts[&EventKind::DimerDissociation], 4);
        assert_eq!(catalog.len(), 53);
        assert_eq!(catalog.len(), expected_len(2, 2));
    }

    #[test]
    fn catalog_size_is_fixed_by_capacities() {
        for (e, t) in [(0, 0), (1, 1), (1, 3), (4, 8), (10, 10)] {
            assert_eq!(Catalog::new(e, t).len(), expected_len(e, t), "({e}, {t})");
        }
    }

    #[test]
    fn affected_events_cover_every_reader_of_written_slots() {
        let catalog = Catalog::new(2, 3);
        let layout = catalog.layout();
        for (i_evt, event) in catalog.events().iter().enumerate() {
            let written: Vec<_> = event
                .writes()
                .into_iter()
                .filter_map(|slot| layout.flat(slot))
                .collect();
            for (j_evt, other) in catalog.events().iter().enumerate() {
                let reads_written = other
                    .reads()
                    .into_iter()
                    .filter_map(|slot| layout.flat(slot))
                    .any(|idx| written.contains(&idx));
                assert_eq!(
                    catalog.affected_by(i_evt).contains(&j_evt),
                    reads_written,
                    "{event:?} -> {other:?}"
                );
            }
        }
    }

    #[test]
    fn binding_affects_every_binding_event() {
        let catalog = Catalog::new(2, 2);
        let i_evt = catalog
            .events()
            .iter()
            .position(|event| event.kind() == EventKind::EffectorBinding)
            .unwrap();
        let affected = catalog.affected_by(i_evt);
        let n_binding = catalog
            .events()
            .iter()
            .enumerate()
            .filter(|(j_evt, event)| {
                affected.contains(j_evt) && event.reads().contains(&Slot::FreeBinder)
            })
            .count();
        assert_eq!(n_binding, 6);
    }

    #[test]
    fn mismatched_state_is_rejected() {
        let catalog = Catalog::new(2, 2);
        assert!(catalog.check_state(&State::empty(2, 2)).is_ok());
        assert_eq!(
            catalog.check_state(&State::empty(2, 3)),
            Err(SimError::ShapeMismatch {
                expected: (2, 2),
                found: (2, 3)
            })
        );
    }
}
