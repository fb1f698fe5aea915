//! Rich-schema records in the version 3 ASCII format.
//!
//! ```text
//! HepMC::Version 3.02.06
//! HepMC::Asciiv3-START_EVENT_LISTING
//! E <number> <n_vertices> <n_particles>
//! U GEV MM
//! W <weight> ...
//! P <id> <parent> <pdg> <px> <py> <pz> <e> <m> <status>
//! V <id> <status> [<in>,<in>,...] @ <x> <y> <z> <t>
//! HepMC::Asciiv3-END_EVENT_LISTING
//! ```
//!
//! A particle's parent is the (negative) id of its production vertex, 0 for
//! none, or a positive particle id meaning "the implicit vertex that particle
//! ends in". Implicit vertices are accepted on read; the writer always emits
//! explicit `V` lines, ordered so that every incoming particle is written
//! before the vertex that lists it.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, Write};

use dps_types::{Event, FourVector, Particle, ParticleId, ParticleIndex, Schema, Vertex, VertexId, VertexIndex};
use tracing::debug;

use crate::block::{BlockReader, Line};
use crate::error::RecordError;
use crate::fields::Fields;
use crate::{EventReader, EventWriter};

const VERSION_LINE: &str = "HepMC::Version 3.02.06";
const START_LINE: &str = "HepMC::Asciiv3-START_EVENT_LISTING";
const END_LINE: &str = "HepMC::Asciiv3-END_EVENT_LISTING";

/// Reads rich-schema events from a v3 ASCII stream.
pub struct RichReader<R> {
    blocks: BlockReader<R>,
}

impl<R: BufRead> RichReader<R> {
    /// Wrap a buffered input stream.
    pub const fn new(inner: R) -> Self {
        Self {
            blocks: BlockReader::new(inner),
        }
    }
}

impl<R: BufRead> EventReader for RichReader<R> {
    fn read_next(&mut self) -> Result<Option<Event>, RecordError> {
        let Some(block) = self.blocks.next_block()? else {
            return Ok(None);
        };
        parse_block(&block).map(Some)
    }
}

/// Accumulates one event while its lines are parsed.
struct Builder {
    event: Event,
    implicit: HashMap<ParticleIndex, VertexIndex>,
    declared: HashSet<VertexId>,
    unresolved: Vec<(usize, VertexIndex, ParticleId)>,
}

fn parse_block(block: &[Line]) -> Result<Event, RecordError> {
    let Some(((header_line, header), body)) = block.split_first() else {
        return Err(RecordError::malformed(0, "empty event block"));
    };
    let mut fields = Fields::new(*header_line, header);
    fields.skip(1, "event tag")?;
    let number: u64 = fields.parse("event number")?;
    let n_vertices: usize = fields.parse("vertex count")?;
    let n_particles: usize = fields.parse("particle count")?;

    let mut builder = Builder {
        event: Event::new(number, Schema::Rich),
        implicit: HashMap::new(),
        declared: HashSet::new(),
        unresolved: Vec::new(),
    };
    for (line, text) in body {
        let mut fields = Fields::new(*line, text);
        match fields.token("record tag")? {
            "P" => builder.particle(&mut fields)?,
            "V" => builder.vertex(&mut fields)?,
            "W" => builder.event.weights = fields.remaining("weight")?,
            // Units, attributes, run info, cross section.
            "U" | "A" | "T" | "C" => {}
            other => {
                return Err(RecordError::malformed(*line, format!("unknown record tag {other:?}")));
            }
        }
    }
    builder.finish(*header_line, n_vertices, n_particles)
}

impl Builder {
    fn particle(&mut self, fields: &mut Fields<'_>) -> Result<(), RecordError> {
        let line = fields.line();
        let id: i64 = fields.parse("particle id")?;
        let parent: i64 = fields.parse("parent")?;
        let pdg: i32 = fields.parse("pdg code")?;
        let px: f64 = fields.parse("px")?;
        let py: f64 = fields.parse("py")?;
        let pz: f64 = fields.parse("pz")?;
        let e: f64 = fields.parse("energy")?;
        let mass: f64 = fields.parse("mass")?;
        let status: i32 = fields.parse("status")?;

        let particle = Particle::new(id, pdg, status, FourVector::new(px, py, pz, e)).with_mass(mass);
        let index = self
            .event
            .add_particle(particle)
            .map_err(|e| RecordError::malformed(line, e.to_string()))?;

        let producer = if parent < 0 {
            Some(self.vertex_slot(line, VertexId(parent))?)
        } else if parent > 0 {
            Some(self.implicit_vertex(line, ParticleId(parent))?)
        } else {
            None
        };
        if let Some(vertex) = producer.and_then(|v| self.event.vertex_mut(v)) {
            vertex.outgoing.push(index);
        }
        Ok(())
    }

    fn vertex(&mut self, fields: &mut Fields<'_>) -> Result<(), RecordError> {
        let line = fields.line();
        let id = VertexId(fields.parse("vertex id")?);
        fields.skip(1, "vertex status")?;
        if !self.declared.insert(id) {
            return Err(RecordError::malformed(line, format!("vertex {id} declared twice")));
        }

        let rest = fields.rest();
        let (list, tail) = rest
            .strip_prefix('[')
            .and_then(|r| r.split_once(']'))
            .ok_or_else(|| RecordError::malformed(line, "missing incoming particle list"))?;

        let slot = self.vertex_slot(line, id)?;
        let mut incoming = Vec::new();
        for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let pid = ParticleId(
                token
                    .parse()
                    .map_err(|_parse_error| RecordError::malformed(line, format!("bad incoming id {token:?}")))?,
            );
            match self.event.find_particle(pid) {
                Some(index) => incoming.push(index),
                None => self.unresolved.push((line, slot, pid)),
            }
        }

        let tail = tail.trim();
        let position = match tail.strip_prefix('@') {
            Some(coords) => {
                let mut coords = Fields::new(line, coords);
                Some(FourVector::new(
                    coords.parse("x")?,
                    coords.parse("y")?,
                    coords.parse("z")?,
                    coords.parse("t")?,
                ))
            }
            None if tail.is_empty() => None,
            None => return Err(RecordError::malformed(line, format!("unexpected vertex tail {tail:?}"))),
        };

        if let Some(vertex) = self.event.vertex_mut(slot) {
            vertex.incoming.extend(incoming);
            if let Some(position) = position {
                vertex.position = position;
            }
        }
        Ok(())
    }

    /// Existing vertex with this id, or a fresh placeholder for it. An id
    /// already handed to an implicit vertex cannot be reused.
    fn vertex_slot(&mut self, line: usize, id: VertexId) -> Result<VertexIndex, RecordError> {
        match self.event.find_vertex(id) {
            Some(index) if self.implicit.values().any(|&v| v == index) => Err(RecordError::malformed(
                line,
                format!("vertex {id} collides with an implicit vertex"),
            )),
            Some(index) => Ok(index),
            None => self
                .event
                .add_vertex(Vertex::new(id))
                .map_err(|e| RecordError::malformed(line, e.to_string())),
        }
    }

    fn implicit_vertex(&mut self, line: usize, parent: ParticleId) -> Result<VertexIndex, RecordError> {
        let parent_index = self
            .event
            .find_particle(parent)
            .ok_or_else(|| RecordError::malformed(line, format!("unknown parent particle {parent}")))?;
        if let Some(&vertex) = self.implicit.get(&parent_index) {
            return Ok(vertex);
        }
        let id = self.event.next_vertex_id();
        let vertex = self
            .event
            .add_vertex(Vertex::new(id).with_incoming([parent_index]))
            .map_err(|e| RecordError::malformed(line, e.to_string()))?;
        self.implicit.insert(parent_index, vertex);
        Ok(vertex)
    }

    fn finish(mut self, line: usize, n_vertices: usize, n_particles: usize) -> Result<Event, RecordError> {
        for (edge_line, slot, pid) in std::mem::take(&mut self.unresolved) {
            let index = self
                .event
                .find_particle(pid)
                .ok_or_else(|| RecordError::malformed(edge_line, format!("unknown incoming particle {pid}")))?;
            if let Some(vertex) = self.event.vertex_mut(slot) {
                vertex.incoming.push(index);
            }
        }
        if self.event.particle_count() != n_particles {
            return Err(RecordError::malformed(
                line,
                format!("declared {n_particles} particles, found {}", self.event.particle_count()),
            ));
        }
        if self.event.vertex_count() != n_vertices {
            return Err(RecordError::malformed(
                line,
                format!("declared {n_vertices} vertices, found {}", self.event.vertex_count()),
            ));
        }
        Ok(self.event)
    }
}

/// Writes rich-schema events as a v3 ASCII stream.
pub struct RichWriter<W: Write> {
    inner: W,
    finished: bool,
}

impl<W: Write> RichWriter<W> {
    /// Wrap an output stream and write the listing header.
    pub fn new(mut inner: W) -> Result<Self, RecordError> {
        writeln!(inner, "{VERSION_LINE}")?;
        writeln!(inner, "{START_LINE}")?;
        Ok(Self { inner, finished: false })
    }

    /// Give back the underlying stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn write_particle(&mut self, particle: &Particle, parent: VertexId) -> Result<(), RecordError> {
        let p = &particle.momentum;
        writeln!(
            self.inner,
            "P {} {} {} {:e} {:e} {:e} {:e} {:e} {}",
            particle.id, parent, particle.pdg, p.x, p.y, p.z, p.t, particle.mass, particle.status
        )?;
        Ok(())
    }
}

impl<W: Write> EventWriter for RichWriter<W> {
    fn write_next(&mut self, event: &Event) -> Result<(), RecordError> {
        if event.schema != Schema::Rich {
            return Err(RecordError::SchemaMismatch {
                expected: Schema::Rich,
                found: event.schema,
            });
        }
        if let Some(vertex) = event.vertices().iter().find(|v| v.id.into_inner() >= 0) {
            return Err(RecordError::Unrepresentable {
                event: event.number,
                reason: format!("vertex id {} is not negative", vertex.id),
            });
        }

        writeln!(
            self.inner,
            "E {} {} {}",
            event.number,
            event.vertex_count(),
            event.particle_count()
        )?;
        writeln!(self.inner, "U GEV MM")?;
        if !event.weights.is_empty() {
            let weights: Vec<String> = event.weights.iter().map(|w| format!("{w:e}")).collect();
            writeln!(self.inner, "W {}", weights.join(" "))?;
        }

        let mut producer: Vec<Option<usize>> = vec![None; event.particle_count()];
        for (v, vertex) in event.vertices().iter().enumerate() {
            for out in &vertex.outgoing {
                if let Some(slot) = producer.get_mut(out.get()) {
                    slot.get_or_insert(v);
                }
            }
        }

        let mut written = vec![false; event.particle_count()];
        for ((particle, produced), done) in event.particles().iter().zip(&producer).zip(written.iter_mut()) {
            if produced.is_none() {
                self.write_particle(particle, VertexId(0))?;
                *done = true;
            }
        }

        // Emit vertices once all their incoming particles are out. Whatever
        // is left when no more progress is possible (a cyclic graph) goes out
        // in arena order.
        let vertices = event.vertices();
        let mut emitted = vec![false; vertices.len()];
        loop {
            let pending: Vec<usize> = emitted
                .iter()
                .enumerate()
                .filter(|(_, done)| !**done)
                .map(|(v, _)| v)
                .collect();
            if pending.is_empty() {
                break;
            }
            let ready: Vec<usize> = pending
                .iter()
                .copied()
                .filter(|&v| {
                    vertices.get(v).is_some_and(|vertex| {
                        vertex
                            .incoming
                            .iter()
                            .all(|p| written.get(p.get()).copied().unwrap_or(true))
                    })
                })
                .collect();
            let batch = if ready.is_empty() {
                debug!(event = event.number, "cyclic vertex graph, writing in arena order");
                pending
            } else {
                ready
            };

            for v in batch {
                let Some(vertex) = vertices.get(v) else {
                    continue;
                };
                let incoming: Vec<String> = vertex
                    .incoming
                    .iter()
                    .filter_map(|&p| event.particle(p))
                    .map(|p| p.id.to_string())
                    .collect();
                let pos = &vertex.position;
                writeln!(
                    self.inner,
                    "V {} 0 [{}] @ {:e} {:e} {:e} {:e}",
                    vertex.id,
                    incoming.join(","),
                    pos.x,
                    pos.y,
                    pos.z,
                    pos.t
                )?;
                for &out in &vertex.outgoing {
                    let home = producer.get(out.get()).copied().flatten() == Some(v);
                    let Some(done) = written.get_mut(out.get()) else {
                        continue;
                    };
                    if home && !*done {
                        if let Some(particle) = event.particle(out) {
                            self.write_particle(particle, vertex.id)?;
                            *done = true;
                        }
                    }
                }
                if let Some(done) = emitted.get_mut(v) {
                    *done = true;
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RecordError> {
        if !self.finished {
            writeln!(self.inner, "{END_LINE}")?;
            self.finished = true;
        }
        self.inner.flush()?;
        Ok(())
    }
}
