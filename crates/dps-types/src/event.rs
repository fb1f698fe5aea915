//! Events as index-addressed particle and vertex arenas.
//!
//! An [`Event`] owns its particles and vertices exclusively. Vertex edges are
//! [`ParticleIndex`] values into the particle arena rather than references, so
//! copying, checkpointing, and identifier remapping are plain data operations.
//!
//! Particle identifiers are unique within an event; [`Event::add_particle`]
//! rejects duplicates. Vertex edges are not validated on insertion because
//! generator working states and partially read records can be transiently
//! inconsistent; [`Event::validate`] checks the whole graph on demand.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ParticleId, ParticleIndex, VertexId, VertexIndex};
use crate::kinematics::FourVector;
use crate::status::{ParticleStatus, Schema};

/// Errors raised while building or validating an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// A particle with this identifier already exists in the event.
    #[error("duplicate particle id {0}")]
    DuplicateParticle(ParticleId),

    /// A vertex with this identifier already exists in the event.
    #[error("duplicate vertex id {0}")]
    DuplicateVertex(VertexId),

    /// A vertex edge points outside the particle arena.
    #[error("vertex {vertex} references missing particle {index}")]
    DanglingEdge {
        /// The vertex holding the edge.
        vertex: VertexId,
        /// The out-of-range particle index.
        index: ParticleIndex,
    },
}

/// A particle entry in an event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Record identifier, unique within the owning event.
    pub id: ParticleId,
    /// PDG identity code (species and charge).
    pub pdg: i32,
    /// Raw status code, interpreted through the owning event's [`Schema`].
    pub status: i32,
    /// Four-momentum `(px, py, pz, e)`.
    pub momentum: FourVector,
    /// Generated mass as written by the producer.
    pub mass: f64,
}

impl Particle {
    /// Create a particle whose generated mass is taken from its momentum.
    pub fn new(id: impl Into<ParticleId>, pdg: i32, status: i32, momentum: FourVector) -> Self {
        Self {
            id: id.into(),
            pdg,
            status,
            mass: momentum.m(),
            momentum,
        }
    }

    /// Override the generated mass.
    #[must_use]
    pub const fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    /// Absolute PDG code, ignoring the particle/antiparticle sign.
    pub const fn abs_pdg(&self) -> u32 {
        self.pdg.unsigned_abs()
    }
}

/// A space-time vertex joining incoming and outgoing particles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Record identifier, unique within the owning event.
    pub id: VertexId,
    /// Position `(x, y, z, t)`.
    pub position: FourVector,
    /// Incoming particle edges, in record order.
    pub incoming: Vec<ParticleIndex>,
    /// Outgoing particle edges, in record order.
    pub outgoing: Vec<ParticleIndex>,
}

impl Vertex {
    /// Create a vertex at the origin with no edges.
    pub fn new(id: impl Into<VertexId>) -> Self {
        Self {
            id: id.into(),
            position: FourVector::ZERO,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    /// Set the vertex position.
    #[must_use]
    pub const fn at(mut self, position: FourVector) -> Self {
        self.position = position;
        self
    }

    /// Set the incoming edges.
    #[must_use]
    pub fn with_incoming(mut self, incoming: impl IntoIterator<Item = ParticleIndex>) -> Self {
        self.incoming = incoming.into_iter().collect();
        self
    }

    /// Set the outgoing edges.
    #[must_use]
    pub fn with_outgoing(mut self, outgoing: impl IntoIterator<Item = ParticleIndex>) -> Self {
        self.outgoing = outgoing.into_iter().collect();
        self
    }
}

/// One collision record.
///
/// Deserialization goes through [`Event::add_particle`] and
/// [`Event::add_vertex`], so the identifier lookups are rebuilt and duplicate
/// identifiers are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EventRepr")]
pub struct Event {
    /// Sequence number of the event within its stream.
    pub number: u64,
    /// Status-code convention of the particles.
    pub schema: Schema,
    /// Event weights; empty means a single implicit weight of 1.0.
    pub weights: Vec<f64>,
    particles: Vec<Particle>,
    vertices: Vec<Vertex>,
    #[serde(skip)]
    particle_lookup: HashMap<ParticleId, ParticleIndex>,
    #[serde(skip)]
    vertex_lookup: HashMap<VertexId, VertexIndex>,
}

/// Wire form of an [`Event`], without the lookups.
#[derive(Deserialize)]
struct EventRepr {
    number: u64,
    schema: Schema,
    weights: Vec<f64>,
    particles: Vec<Particle>,
    vertices: Vec<Vertex>,
}

impl TryFrom<EventRepr> for Event {
    type Error = EventError;

    fn try_from(repr: EventRepr) -> Result<Self, Self::Error> {
        let mut event = Self::new(repr.number, repr.schema);
        event.weights = repr.weights;
        for particle in repr.particles {
            event.add_particle(particle)?;
        }
        for vertex in repr.vertices {
            event.add_vertex(vertex)?;
        }
        Ok(event)
    }
}

impl Event {
    /// Create an empty event.
    pub fn new(number: u64, schema: Schema) -> Self {
        Self {
            number,
            schema,
            weights: Vec::new(),
            particles: Vec::new(),
            vertices: Vec::new(),
            particle_lookup: HashMap::new(),
            vertex_lookup: HashMap::new(),
        }
    }

    /// Set a single event weight.
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weights = vec![weight];
        self
    }

    /// The event weight: the first weight, or 1.0 if none is recorded.
    pub fn weight(&self) -> f64 {
        self.weights.first().copied().unwrap_or(1.0)
    }

    /// Whether the event has no particles.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Number of particles.
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// All particles in arena order.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// All vertices in arena order.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Particle at an arena index.
    pub fn particle(&self, index: ParticleIndex) -> Option<&Particle> {
        self.particles.get(index.get())
    }

    /// Vertex at an arena index.
    pub fn vertex(&self, index: VertexIndex) -> Option<&Vertex> {
        self.vertices.get(index.get())
    }

    /// Mutable vertex at an arena index.
    pub fn vertex_mut(&mut self, index: VertexIndex) -> Option<&mut Vertex> {
        self.vertices.get_mut(index.get())
    }

    /// Arena index of the particle with the given identifier.
    pub fn find_particle(&self, id: ParticleId) -> Option<ParticleIndex> {
        self.particle_lookup.get(&id).copied()
    }

    /// Arena index of the vertex with the given identifier.
    pub fn find_vertex(&self, id: VertexId) -> Option<VertexIndex> {
        self.vertex_lookup.get(&id).copied()
    }

    /// Canonical status of a particle, decoded through the event's schema.
    pub fn status_of(&self, particle: &Particle) -> ParticleStatus {
        self.schema.classify(particle.status)
    }

    /// Append a particle, rejecting duplicate identifiers.
    pub fn add_particle(&mut self, particle: Particle) -> Result<ParticleIndex, EventError> {
        if self.particle_lookup.contains_key(&particle.id) {
            return Err(EventError::DuplicateParticle(particle.id));
        }
        let index = ParticleIndex(self.particles.len());
        self.particle_lookup.insert(particle.id, index);
        self.particles.push(particle);
        Ok(index)
    }

    /// Append a vertex, rejecting duplicate identifiers. Edges are not checked.
    pub fn add_vertex(&mut self, vertex: Vertex) -> Result<VertexIndex, EventError> {
        if self.vertex_lookup.contains_key(&vertex.id) {
            return Err(EventError::DuplicateVertex(vertex.id));
        }
        let index = VertexIndex(self.vertices.len());
        self.vertex_lookup.insert(vertex.id, index);
        self.vertices.push(vertex);
        Ok(index)
    }

    /// Re-mark a particle's status. Only generator working states do this.
    pub fn set_status(&mut self, index: ParticleIndex, status: i32) -> bool {
        match self.particles.get_mut(index.get()) {
            Some(particle) => {
                particle.status = status;
                true
            }
            None => false,
        }
    }

    /// Re-encode every status code into `target` and retag the event.
    ///
    /// Codes go through the canonical [`ParticleStatus`]; nothing else
    /// changes. A no-op when the event is already in `target`.
    pub fn reencode(&mut self, target: Schema) {
        if self.schema == target {
            return;
        }
        for particle in &mut self.particles {
            particle.status = self.schema.convert(particle.status, target);
        }
        self.schema = target;
    }

    /// Largest particle identifier magnitude, 0 for an empty event.
    pub fn max_particle_id(&self) -> u64 {
        self.particles.iter().map(|p| p.id.magnitude()).max().unwrap_or(0)
    }

    /// Largest vertex identifier magnitude, 0 for an event without vertices.
    pub fn max_vertex_id(&self) -> u64 {
        self.vertices.iter().map(|v| v.id.magnitude()).max().unwrap_or(0)
    }

    /// Next unused negative vertex identifier.
    pub fn next_vertex_id(&self) -> VertexId {
        let magnitude = i64::try_from(self.max_vertex_id()).unwrap_or(i64::MAX);
        VertexId(magnitude.saturating_add(1).saturating_neg())
    }

    /// Next unused positive particle identifier.
    pub fn next_particle_id(&self) -> ParticleId {
        let magnitude = i64::try_from(self.max_particle_id()).unwrap_or(i64::MAX);
        ParticleId(magnitude.saturating_add(1))
    }

    /// The vertex that produced a particle (first vertex listing it outgoing).
    pub fn production_vertex(&self, index: ParticleIndex) -> Option<VertexIndex> {
        self.vertices
            .iter()
            .position(|v| v.outgoing.contains(&index))
            .map(VertexIndex)
    }

    /// The vertex a particle ends in (first vertex listing it incoming).
    pub fn end_vertex(&self, index: ParticleIndex) -> Option<VertexIndex> {
        self.vertices
            .iter()
            .position(|v| v.incoming.contains(&index))
            .map(VertexIndex)
    }

    /// Particles produced at a particle's end vertex.
    pub fn daughters(&self, index: ParticleIndex) -> impl Iterator<Item = (ParticleIndex, &Particle)> {
        self.end_vertex(index)
            .and_then(|v| self.vertex(v))
            .into_iter()
            .flat_map(|v| v.outgoing.iter())
            .filter_map(move |&i| self.particle(i).map(|p| (i, p)))
    }

    /// Check that every vertex edge resolves to a particle of this event.
    pub fn validate(&self) -> Result<(), EventError> {
        for vertex in &self.vertices {
            let mut edges = vertex.incoming.iter().chain(vertex.outgoing.iter());
            if let Some(&index) = edges.find(|i| i.get() >= self.particles.len()) {
                return Err(EventError::DanglingEdge {
                    vertex: vertex.id,
                    index,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn two_body_decay() -> Event {
        let mut event = Event::new(1, Schema::Rich);
        let phi = event
            .add_particle(Particle::new(1, 333, -83, FourVector::from_mass(0.0, 2.0, 1.0, 1.019)))
            .unwrap();
        let kp = event
            .add_particle(Particle::new(2, 321, 91, FourVector::from_mass(0.1, 1.0, 0.5, 0.494)))
            .unwrap();
        let km = event
            .add_particle(Particle::new(3, -321, 91, FourVector::from_mass(-0.1, 1.0, 0.5, 0.494)))
            .unwrap();
        event
            .add_vertex(Vertex::new(-1).with_incoming([phi]).with_outgoing([kp, km]))
            .unwrap();
        event
    }

    #[test]
    fn weight_defaults_to_one() {
        let event = Event::new(1, Schema::Rich);
        assert!((event.weight() - 1.0).abs() < f64::EPSILON);
        let weighted = event.with_weight(0.25);
        assert!((weighted.weight() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn duplicate_particle_rejected() {
        let mut event = two_body_decay();
        let dup = Particle::new(2, 22, 1, FourVector::ZERO);
        assert_eq!(
            event.add_particle(dup),
            Err(EventError::DuplicateParticle(ParticleId(2)))
        );
        assert_eq!(event.particle_count(), 3);
    }

    #[test]
    fn duplicate_vertex_rejected() {
        let mut event = two_body_decay();
        assert_eq!(
            event.add_vertex(Vertex::new(-1)),
            Err(EventError::DuplicateVertex(VertexId(-1)))
        );
    }

    #[test]
    fn daughters_follow_end_vertex() {
        let event = two_body_decay();
        let pdgs: Vec<i32> = event.daughters(ParticleIndex(0)).map(|(_, p)| p.pdg).collect();
        assert_eq!(pdgs, vec![321, -321]);
        assert_eq!(event.production_vertex(ParticleIndex(1)), Some(VertexIndex(0)));
        assert_eq!(event.end_vertex(ParticleIndex(1)), None);
    }

    #[test]
    fn status_goes_through_schema() {
        let event = two_body_decay();
        let phi = event.particle(ParticleIndex(0)).unwrap();
        assert_eq!(event.status_of(phi), ParticleStatus::Decayed);
    }

    #[test]
    fn validate_catches_dangling_edge() {
        let mut event = two_body_decay();
        assert!(event.validate().is_ok());
        event
            .add_vertex(Vertex::new(-2).with_incoming([ParticleIndex(9)]))
            .unwrap();
        assert!(matches!(
            event.validate(),
            Err(EventError::DanglingEdge { index: ParticleIndex(9), .. })
        ));
    }

    #[test]
    fn reencode_goes_through_canonical_status() {
        let mut event = two_body_decay();
        event.reencode(Schema::Minimal);
        assert_eq!(event.schema, Schema::Minimal);
        let codes: Vec<i32> = event.particles().iter().map(|p| p.status).collect();
        assert_eq!(codes, vec![2, 1, 1]);
        assert_eq!(event.find_particle(ParticleId(3)), Some(ParticleIndex(2)));
    }

    #[test]
    fn next_ids_extend_ranges() {
        let event = two_body_decay();
        assert_eq!(event.next_particle_id(), ParticleId(4));
        assert_eq!(event.next_vertex_id(), VertexId(-2));
        assert_eq!(event.max_particle_id(), 3);
    }

    #[test]
    fn deserialized_event_keeps_its_lookups() {
        let event = two_body_decay();
        let json = serde_json::to_string(&event).unwrap();
        let mut back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.find_particle(ParticleId(2)), Some(ParticleIndex(1)));
        assert_eq!(back.find_vertex(VertexId(-1)), Some(VertexIndex(0)));
        assert_eq!(
            back.add_particle(Particle::new(2, 22, 1, FourVector::ZERO)),
            Err(EventError::DuplicateParticle(ParticleId(2)))
        );
    }

    #[test]
    fn deserialization_rejects_duplicate_ids() {
        let mut json = serde_json::to_value(two_body_decay()).unwrap();
        json["particles"][2]["id"] = serde_json::json!(1);
        let err = serde_json::from_value::<Event>(json).unwrap_err();
        assert!(err.to_string().contains("duplicate particle id 1"));
    }
}
