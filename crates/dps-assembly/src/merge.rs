//! Merging two events into one composite record.
//!
//! The secondary event's identifiers are moved out of the primary's range by
//! offsets derived from the largest identifier magnitude on either side, so
//! the union never collides however the inputs were numbered. Vertex edges
//! are rebuilt by identifier through the remapping; an edge that cannot be
//! resolved is dropped and counted rather than failing the merge.

use std::borrow::Cow;
use std::ops::Range;

use dps_types::{Event, EventError, ParticleIndex, Vertex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::convert::convert;

/// Errors that can occur while merging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// An identifier is too large to leave room for an offset.
    #[error("identifier magnitude {magnitude} leaves no room for an offset")]
    OffsetOverflow {
        /// The largest magnitude seen.
        magnitude: u64,
    },

    /// Remapped identifiers still collided (offset saturated).
    #[error("remapped identifiers collide: {source}")]
    Collision {
        /// The underlying insertion error.
        #[from]
        source: EventError,
    },
}

/// Two source events joined into one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeEvent {
    /// The merged record, in the primary's schema.
    pub event: Event,
    /// Arena positions of the primary's particles.
    pub primary_particles: Range<usize>,
    /// Arena positions of the secondary's particles.
    pub secondary_particles: Range<usize>,
    /// Offset applied to the secondary's particle identifiers.
    pub particle_offset: i64,
    /// Offset applied to the secondary's vertex identifiers.
    pub vertex_offset: i64,
    /// Vertex edges that could not be resolved and were left out.
    pub dropped_edges: usize,
}

/// Merge `secondary` into `primary` as composite record `number`.
///
/// The primary's particles and vertices keep their identifiers. The
/// secondary's are moved away from zero by `1 + ` the largest magnitude in
/// either event, and re-encoded into the primary's schema if they differ.
/// The weight is the product of both weights.
pub fn merge(primary: &Event, secondary: &Event, number: u64) -> Result<CompositeEvent, MergeError> {
    let particle_offset = offset_past(primary.max_particle_id().max(secondary.max_particle_id()))?;
    let vertex_offset = offset_past(primary.max_vertex_id().max(secondary.max_vertex_id()))?;

    let secondary = if secondary.schema == primary.schema {
        Cow::Borrowed(secondary)
    } else {
        debug!(
            from = %secondary.schema,
            to = %primary.schema,
            "Re-encoding secondary event before merge"
        );
        Cow::Owned(convert(secondary, primary.schema, secondary.number))
    };

    let mut event = Event::new(number, primary.schema).with_weight(primary.weight() * secondary.weight());
    for particle in primary.particles() {
        event.add_particle(particle.clone())?;
    }
    let split = event.particle_count();
    for particle in secondary.particles() {
        let mut particle = particle.clone();
        particle.id = particle.id.shifted_away_from_zero(particle_offset);
        event.add_particle(particle)?;
    }

    let mut dropped_edges = 0;
    for vertex in primary.vertices() {
        let rebuilt = rebuild(vertex, primary, &event, 0, 0, &mut dropped_edges);
        event.add_vertex(rebuilt)?;
    }
    for vertex in secondary.vertices() {
        let rebuilt = rebuild(
            vertex,
            &secondary,
            &event,
            particle_offset,
            vertex_offset,
            &mut dropped_edges,
        );
        event.add_vertex(rebuilt)?;
    }
    if dropped_edges > 0 {
        debug!(event = number, dropped_edges, "Dropped unresolvable vertex edges");
    }

    Ok(CompositeEvent {
        primary_particles: 0..split,
        secondary_particles: split..event.particle_count(),
        event,
        particle_offset,
        vertex_offset,
        dropped_edges,
    })
}

/// `1 + magnitude`, as a signed offset.
fn offset_past(magnitude: u64) -> Result<i64, MergeError> {
    i64::try_from(magnitude)
        .ok()
        .and_then(|m| m.checked_add(1))
        .ok_or(MergeError::OffsetOverflow { magnitude })
}

/// Copy a vertex into `target`, resolving edges by remapped identifier.
fn rebuild(
    vertex: &Vertex,
    source: &Event,
    target: &Event,
    particle_offset: i64,
    vertex_offset: i64,
    dropped: &mut usize,
) -> Vertex {
    let mut resolve = |edges: &[ParticleIndex]| -> Vec<ParticleIndex> {
        let mut resolved = Vec::with_capacity(edges.len());
        for &edge in edges {
            let remapped = source
                .particle(edge)
                .map(|p| p.id.shifted_away_from_zero(particle_offset))
                .and_then(|id| target.find_particle(id));
            match remapped {
                Some(index) => resolved.push(index),
                None => {
                    *dropped = dropped.saturating_add(1);
                    debug!(vertex = %vertex.id, edge = %edge, "Edge does not resolve");
                }
            }
        }
        resolved
    };
    let incoming = resolve(&vertex.incoming);
    let outgoing = resolve(&vertex.outgoing);
    Vertex::new(vertex.id.shifted_outward(vertex_offset))
        .at(vertex.position)
        .with_incoming(incoming)
        .with_outgoing(outgoing)
}
