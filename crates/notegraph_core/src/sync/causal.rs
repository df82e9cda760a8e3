//! Deterministic causal ordering of event batches.
//!
//! # Responsibility
//! - Produce one total order over an unordered event set.
//! - Place every event after the events it causally depends on.
//!
//! # Invariants
//! - Output depends only on the set of events, never on arrival order.
//! - Unrelated events follow `(clock, event id)` order.
//! - The creator of an entity precedes every other event referencing it.
//! - A `NOTE_UPDATED` follows the event that produced the content its
//!   `previousHash` fingerprints.
//! - Duplicate event ids collapse to the lowest-ordered instance; copies
//!   sharing id and clock are ranked by their encoded form.
//! - Dependency cycles never stall sorting; the lowest pending event is
//!   released first.

use crate::model::event::{Event, EventPayload};
use crate::model::fingerprint::Fingerprint;
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Returns `events` in a causality-respecting, replica-convergent order.
pub fn sort_events_causally(events: &[Event]) -> Vec<Event> {
    // Encoded form ranks same-id, same-clock copies identically on every replica.
    let mut ordered: Vec<(&Event, String)> = events
        .iter()
        .map(|event| (event, serde_json::to_string(event).unwrap_or_default()))
        .collect();
    ordered.sort_by(|(left, left_text), (right, right_text)| {
        left.order_key()
            .cmp(&right.order_key())
            .then_with(|| left_text.cmp(right_text))
    });

    let mut seen_ids = BTreeSet::new();
    let mut unique: Vec<&Event> = Vec::with_capacity(ordered.len());
    for (event, _) in ordered {
        if seen_ids.insert(event.id.as_str()) {
            unique.push(event);
        } else {
            debug!(
                "event=causal_sort module=sync status=duplicate event_id={}",
                event.id
            );
        }
    }

    let graph = DependencyGraph::build(&unique);
    graph
        .topological_order()
        .into_iter()
        .map(|index| unique[index].clone())
        .collect()
}

/// Dependency edges over events indexed in `(clock, id)` order.
struct DependencyGraph {
    successors: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
}

/// First-seen (lowest-ordered) index per referenced entity.
#[derive(Default)]
struct EntityIndex<'a> {
    note_creators: BTreeMap<&'a str, usize>,
    super_tag_creators: BTreeMap<&'a str, usize>,
    link_creators: BTreeMap<(&'a str, &'a str), usize>,
    content_producers: BTreeMap<(&'a str, Fingerprint), usize>,
}

impl<'a> EntityIndex<'a> {
    fn build(events: &[&'a Event]) -> Self {
        let mut index = Self::default();
        for (position, event) in events.iter().enumerate() {
            match &event.payload {
                EventPayload::NoteCreated(body) => {
                    index
                        .note_creators
                        .entry(body.note_id.as_str())
                        .or_insert(position);
                    index
                        .content_producers
                        .entry((body.note_id.as_str(), Fingerprint::of(&body.content)))
                        .or_insert(position);
                }
                EventPayload::NoteUpdated(body) => {
                    index
                        .content_producers
                        .entry((body.note_id.as_str(), Fingerprint::of(&body.content)))
                        .or_insert(position);
                }
                EventPayload::LinkCreated(body) => {
                    index
                        .link_creators
                        .entry((body.source_id.as_str(), body.link_id.as_str()))
                        .or_insert(position);
                }
                EventPayload::SuperTagCreated(body) => {
                    index
                        .super_tag_creators
                        .entry(body.super_tag_id.as_str())
                        .or_insert(position);
                }
                _ => {}
            }
        }
        index
    }

    fn dependencies_of(&self, event: &Event) -> Vec<usize> {
        let note = |id: &str| self.note_creators.get(id).copied();
        let super_tag = |id: &str| self.super_tag_creators.get(id).copied();
        let link = |source: &str, link: &str| self.link_creators.get(&(source, link)).copied();

        let candidates: Vec<Option<usize>> = match &event.payload {
            EventPayload::NoteCreated(body) => vec![note(&body.note_id)],
            EventPayload::NoteUpdated(body) => vec![
                note(&body.note_id),
                self.content_producers
                    .get(&(body.note_id.as_str(), body.previous_hash))
                    .copied(),
            ],
            EventPayload::NoteDeleted(body) => vec![note(&body.note_id)],
            EventPayload::NoteRenamed(body) => vec![note(&body.note_id)],
            EventPayload::LinkCreated(body) => vec![
                note(&body.source_id),
                note(&body.target_id),
                link(&body.source_id, &body.link_id),
            ],
            EventPayload::LinkUpdated(body) => vec![
                note(&body.source_id),
                link(&body.source_id, &body.link_id),
                body.changes.target.as_deref().and_then(note),
            ],
            EventPayload::LinkDeleted(body) => vec![
                note(&body.source_id),
                link(&body.source_id, &body.link_id),
            ],
            EventPayload::SuperTagCreated(body) => vec![super_tag(&body.super_tag_id)],
            EventPayload::SuperTagUpdated(body) => vec![super_tag(&body.super_tag_id)],
            EventPayload::SuperTagDeleted(body) => vec![super_tag(&body.super_tag_id)],
            EventPayload::SuperTagAssigned(body) | EventPayload::SuperTagUnassigned(body) => {
                vec![note(&body.note_id), super_tag(&body.super_tag_id)]
            }
            EventPayload::AttributeUpdated(body) => {
                vec![note(&body.note_id), super_tag(&body.super_tag_id)]
            }
        };

        candidates.into_iter().flatten().collect()
    }
}

impl DependencyGraph {
    fn build(events: &[&Event]) -> Self {
        let index = EntityIndex::build(events);
        let mut successors = vec![Vec::new(); events.len()];
        let mut in_degree = vec![0; events.len()];

        for (position, event) in events.iter().enumerate() {
            let dependencies: BTreeSet<usize> = index
                .dependencies_of(event)
                .into_iter()
                .filter(|dependency| *dependency != position)
                .collect();
            in_degree[position] = dependencies.len();
            for dependency in dependencies {
                successors[dependency].push(position);
            }
        }

        Self {
            successors,
            in_degree,
        }
    }

    /// Kahn's algorithm with the lowest index as priority.
    fn topological_order(mut self) -> Vec<usize> {
        let mut pending: BTreeSet<usize> = (0..self.in_degree.len()).collect();
        let mut ready: BTreeSet<usize> = pending
            .iter()
            .copied()
            .filter(|position| self.in_degree[*position] == 0)
            .collect();
        let mut order = Vec::with_capacity(pending.len());

        while let Some(&lowest_pending) = pending.first() {
            let next = match ready.pop_first() {
                Some(position) => position,
                None => {
                    warn!(
                        "event=causal_sort module=sync status=cycle_broken position={} pending={}",
                        lowest_pending,
                        pending.len()
                    );
                    lowest_pending
                }
            };
            pending.remove(&next);
            order.push(next);

            for successor in std::mem::take(&mut self.successors[next]) {
                if !pending.contains(&successor) {
                    continue;
                }
                self.in_degree[successor] = self.in_degree[successor].saturating_sub(1);
                if self.in_degree[successor] == 0 {
                    ready.insert(successor);
                }
            }
        }

        order
    }
}
