//! Minimal-schema records in the version 2 `IO_GenEvent` ASCII format.
//!
//! ```text
//! HepMC::Version 2.06.09
//! HepMC::IO_GenEvent-START_EVENT_LISTING
//! E <number> <mpi> <scale> <aqcd> <aqed> <process> <signal_vtx> <n_vertices> <beam1> <beam2> <n_rand> [rand...] <n_weights> [weight...]
//! U GEV MM
//! V <barcode> <id> <x> <y> <z> <t> <n_orphan> <n_out> <n_weights> [weight...]
//! P <barcode> <pdg> <px> <py> <pz> <e> <m> <status> <theta> <phi> <end_vtx> <n_flow> [flow...]
//! HepMC::IO_GenEvent-END_EVENT_LISTING
//! ```
//!
//! Each `V` line is followed by its orphan incoming particles (those with no
//! production vertex) and then its outgoing particles. A particle's end vertex
//! is given by barcode, so decay chains are linked after the whole block has
//! been read.

use std::io::{BufRead, Write};

use dps_types::{Event, FourVector, Particle, ParticleIndex, Schema, Vertex, VertexId, VertexIndex};
use tracing::warn;

use crate::block::{BlockReader, Line};
use crate::error::RecordError;
use crate::fields::Fields;
use crate::{EventReader, EventWriter};

const VERSION_LINE: &str = "HepMC::Version 2.06.09";
const START_LINE: &str = "HepMC::IO_GenEvent-START_EVENT_LISTING";
const END_LINE: &str = "HepMC::IO_GenEvent-END_EVENT_LISTING";

/// Reads minimal-schema events from a v2 ASCII stream.
pub struct MinimalReader<R> {
    blocks: BlockReader<R>,
}

impl<R: BufRead> MinimalReader<R> {
    /// Wrap a buffered input stream.
    pub const fn new(inner: R) -> Self {
        Self {
            blocks: BlockReader::new(inner),
        }
    }
}

impl<R: BufRead> EventReader for MinimalReader<R> {
    fn read_next(&mut self) -> Result<Option<Event>, RecordError> {
        let Some(block) = self.blocks.next_block()? else {
            return Ok(None);
        };
        parse_block(&block).map(Some)
    }
}

/// The vertex whose particle list is currently being read.
struct OpenVertex {
    line: usize,
    index: VertexIndex,
    orphans_left: usize,
    outgoing_left: usize,
}

impl OpenVertex {
    const fn is_complete(&self) -> bool {
        self.orphans_left == 0 && self.outgoing_left == 0
    }
}

fn parse_block(block: &[Line]) -> Result<Event, RecordError> {
    let Some(((header_line, header), body)) = block.split_first() else {
        return Err(RecordError::malformed(0, "empty event block"));
    };
    let mut fields = Fields::new(*header_line, header);
    fields.skip(1, "event tag")?;
    let number: u64 = fields.parse("event number")?;
    fields.skip(6, "event header")?;
    let n_vertices: usize = fields.parse("vertex count")?;
    fields.skip(2, "beam barcodes")?;
    let n_random: usize = fields.parse("random state count")?;
    fields.skip(n_random, "random state")?;
    let weights = fields.counted_floats("weights")?;

    let mut event = Event::new(number, Schema::Minimal);
    event.weights = weights;
    let mut open: Option<OpenVertex> = None;
    let mut end_links: Vec<(usize, ParticleIndex, VertexId)> = Vec::new();

    for (line, text) in body {
        let mut fields = Fields::new(*line, text);
        match fields.token("record tag")? {
            "V" => {
                close(open.take())?;
                let id = VertexId(fields.parse("vertex barcode")?);
                fields.skip(1, "vertex status")?;
                let position = FourVector::new(
                    fields.parse("x")?,
                    fields.parse("y")?,
                    fields.parse("z")?,
                    fields.parse("t")?,
                );
                let orphans_left = fields.parse("orphan count")?;
                let outgoing_left = fields.parse("outgoing count")?;
                let index = event
                    .add_vertex(Vertex::new(id).at(position))
                    .map_err(|e| RecordError::malformed(*line, e.to_string()))?;
                open = Some(OpenVertex {
                    line: *line,
                    index,
                    orphans_left,
                    outgoing_left,
                });
            }
            "P" => {
                let barcode: i64 = fields.parse("particle barcode")?;
                let pdg: i32 = fields.parse("pdg code")?;
                let momentum = FourVector::new(
                    fields.parse("px")?,
                    fields.parse("py")?,
                    fields.parse("pz")?,
                    fields.parse("energy")?,
                );
                let mass: f64 = fields.parse("mass")?;
                let status: i32 = fields.parse("status")?;
                fields.skip(2, "polarization")?;
                let end_vertex: i64 = fields.parse("end vertex")?;

                let index = event
                    .add_particle(Particle::new(barcode, pdg, status, momentum).with_mass(mass))
                    .map_err(|e| RecordError::malformed(*line, e.to_string()))?;
                let current = open
                    .as_mut()
                    .filter(|v| !v.is_complete())
                    .ok_or_else(|| RecordError::malformed(*line, "particle outside a vertex block"))?;
                if current.orphans_left > 0 {
                    current.orphans_left = current.orphans_left.saturating_sub(1);
                    if let Some(vertex) = event.vertex_mut(current.index) {
                        vertex.incoming.push(index);
                    }
                } else {
                    current.outgoing_left = current.outgoing_left.saturating_sub(1);
                    if let Some(vertex) = event.vertex_mut(current.index) {
                        vertex.outgoing.push(index);
                    }
                    if end_vertex != 0 {
                        end_links.push((*line, index, VertexId(end_vertex)));
                    }
                }
            }
            // Weight names, units, cross section, heavy ion, PDF info.
            "N" | "U" | "C" | "H" | "F" => {}
            other => {
                return Err(RecordError::malformed(*line, format!("unknown record tag {other:?}")));
            }
        }
    }
    close(open)?;

    for (line, particle, vertex_id) in end_links {
        let vertex = event
            .find_vertex(vertex_id)
            .ok_or_else(|| RecordError::malformed(line, format!("unknown end vertex {vertex_id}")))?;
        if let Some(vertex) = event.vertex_mut(vertex) {
            vertex.incoming.push(particle);
        }
    }
    if event.vertex_count() != n_vertices {
        return Err(RecordError::malformed(
            *header_line,
            format!("declared {n_vertices} vertices, found {}", event.vertex_count()),
        ));
    }
    Ok(event)
}

fn close(open: Option<OpenVertex>) -> Result<(), RecordError> {
    match open {
        Some(vertex) if !vertex.is_complete() => Err(RecordError::malformed(
            vertex.line,
            format!(
                "vertex expects {} more orphan and {} more outgoing particles",
                vertex.orphans_left, vertex.outgoing_left
            ),
        )),
        _ => Ok(()),
    }
}

/// Writes minimal-schema events as a v2 ASCII stream.
///
/// The format has no place for a particle attached to no vertex; such
/// particles are left out and counted in [`MinimalWriter::detached`].
pub struct MinimalWriter<W: Write> {
    inner: W,
    detached: u64,
    finished: bool,
}

impl<W: Write> MinimalWriter<W> {
    /// Wrap an output stream and write the listing header.
    pub fn new(mut inner: W) -> Result<Self, RecordError> {
        writeln!(inner)?;
        writeln!(inner, "{VERSION_LINE}")?;
        writeln!(inner, "{START_LINE}")?;
        Ok(Self {
            inner,
            detached: 0,
            finished: false,
        })
    }

    /// Particles left out so far because no vertex lists them.
    pub const fn detached(&self) -> u64 {
        self.detached
    }

    /// Give back the underlying stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn write_particle(&mut self, particle: &Particle, end_vertex: VertexId) -> Result<(), RecordError> {
        let p = &particle.momentum;
        writeln!(
            self.inner,
            "P {} {} {:e} {:e} {:e} {:e} {:e} {} 0 0 {} 0",
            particle.id, particle.pdg, p.x, p.y, p.z, p.t, particle.mass, particle.status, end_vertex
        )?;
        Ok(())
    }
}

impl<W: Write> EventWriter for MinimalWriter<W> {
    fn write_next(&mut self, event: &Event) -> Result<(), RecordError> {
        if event.schema != Schema::Minimal {
            return Err(RecordError::SchemaMismatch {
                expected: Schema::Minimal,
                found: event.schema,
            });
        }
        let vertices = event.vertices();

        let mut producer: Vec<Option<usize>> = vec![None; event.particle_count()];
        let mut consumer: Vec<Option<usize>> = vec![None; event.particle_count()];
        for (v, vertex) in vertices.iter().enumerate() {
            for out in &vertex.outgoing {
                if let Some(slot) = producer.get_mut(out.get()) {
                    slot.get_or_insert(v);
                }
            }
            for inc in &vertex.incoming {
                if let Some(slot) = consumer.get_mut(inc.get()) {
                    slot.get_or_insert(v);
                }
            }
        }
        let detached = producer
            .iter()
            .zip(&consumer)
            .filter(|(p, c)| p.is_none() && c.is_none())
            .count();
        if detached > 0 {
            let detached = u64::try_from(detached).unwrap_or(u64::MAX);
            self.detached = self.detached.saturating_add(detached);
            warn!(event = event.number, detached, "Particles without vertices left out of minimal record");
        }

        let mut beams = event
            .particles()
            .iter()
            .filter(|p| event.status_of(p) == dps_types::ParticleStatus::Beam)
            .map(|p| p.id.into_inner());
        let beam1 = beams.next().unwrap_or(0);
        let beam2 = beams.next().unwrap_or(0);
        let signal = vertices.first().map_or(0, |v| v.id.into_inner());
        let weights: String = event.weights.iter().map(|w| format!(" {w:e}")).collect();
        writeln!(
            self.inner,
            "E {} -1 -1 -1 -1 0 {} {} {} {} 0 {}{}",
            event.number,
            signal,
            vertices.len(),
            beam1,
            beam2,
            event.weights.len(),
            weights
        )?;
        writeln!(self.inner, "U GEV MM")?;

        let end_id = |index: ParticleIndex| {
            consumer
                .get(index.get())
                .copied()
                .flatten()
                .and_then(|v| vertices.get(v))
                .map_or(VertexId(0), |v| v.id)
        };
        let mut written = vec![false; event.particle_count()];
        for (v, vertex) in vertices.iter().enumerate() {
            let mut orphans = Vec::new();
            for &inc in &vertex.incoming {
                let i = inc.get();
                let home = producer.get(i).copied().flatten().is_none()
                    && consumer.get(i).copied().flatten() == Some(v);
                if let Some(done) = written.get_mut(i).filter(|done| home && !**done) {
                    *done = true;
                    orphans.push(inc);
                }
            }
            let mut outgoing = Vec::new();
            for &out in &vertex.outgoing {
                let i = out.get();
                let home = producer.get(i).copied().flatten() == Some(v);
                if let Some(done) = written.get_mut(i).filter(|done| home && !**done) {
                    *done = true;
                    outgoing.push(out);
                }
            }

            let pos = &vertex.position;
            writeln!(
                self.inner,
                "V {} 0 {:e} {:e} {:e} {:e} {} {} 0",
                vertex.id,
                pos.x,
                pos.y,
                pos.z,
                pos.t,
                orphans.len(),
                outgoing.len()
            )?;
            for index in orphans.into_iter().chain(outgoing) {
                if let Some(particle) = event.particle(index) {
                    self.write_particle(particle, end_id(index))?;
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

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use dps_types::ParticleId;

    use super::*;

    const SAMPLE: &str = "\
HepMC::Version 2.06.09
HepMC::IO_GenEvent-START_EVENT_LISTING
E 12 -1 -1 -1 -1 0 -1 2 1 2 0 1 0.25
N 1 \"0\"
U GEV MM
V -1 0 0 0 0 0 2 1 0
P 1 2212 0 0 6800 6800 0.938 4 0 0 -1 0
P 2 2212 0 0 -6800 6800 0.938 4 0 0 -1 0
P 3 443 0.5 1.5 20 20.3 3.097 2 0 0 -2 0
V -2 0 0.1 0 0 0 0 2 0
P 4 13 1 1 10 10.1 0.1057 1 0 0 0 0
P 5 -13 -0.5 0.5 10 10.02 0.1057 1 0 0 0 0
HepMC::IO_GenEvent-END_EVENT_LISTING
";

    fn read_all(text: &str) -> Vec<Result<Event, RecordError>> {
        let mut reader = MinimalReader::new(text.as_bytes());
        let mut out = Vec::new();
        loop {
            match reader.read_next() {
                Ok(Some(event)) => out.push(Ok(event)),
                Ok(None) => break,
                Err(e) => out.push(Err(e)),
            }
        }
        out
    }

    #[test]
    fn reads_orphans_outgoing_and_end_vertices() {
        let event = read_all(SAMPLE).pop().unwrap().unwrap();
        assert_eq!(event.number, 12);
        assert_eq!(event.schema, Schema::Minimal);
        assert!((event.weight() - 0.25).abs() < f64::EPSILON);
        assert_eq!(event.vertex_count(), 2);
        assert_eq!(event.vertices()[0].incoming, vec![ParticleIndex(0), ParticleIndex(1)]);
        assert_eq!(event.vertices()[0].outgoing, vec![ParticleIndex(2)]);

        let jpsi = event.find_particle(ParticleId(3)).unwrap();
        let muons: Vec<i32> = event.daughters(jpsi).map(|(_, p)| p.pdg).collect();
        assert_eq!(muons, vec![13, -13]);
        assert!((event.vertices()[1].position.x - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn short_vertex_block_is_malformed() {
        let text = "E 1 -1 -1 -1 -1 0 0 1 0 0 0 0\nV -1 0 0 0 0 0 0 2 0\nP 1 22 0 0 1 1 0 1 0 0 0 0\n\
E 2 -1 -1 -1 -1 0 0 0 0 0 0 0\n";
        let events = read_all(text);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Err(RecordError::Malformed { line: 2, .. })));
        assert!(events[1].as_ref().unwrap().is_empty());
    }

    #[test]
    fn particle_before_any_vertex_is_malformed() {
        let events = read_all("E 1 -1 -1 -1 -1 0 0 0 0 0 0 0\nP 1 22 0 0 1 1 0 1 0 0 0 0\n");
        assert!(events[0].as_ref().unwrap_err().to_string().contains("outside a vertex"));
    }

    #[test]
    fn random_states_are_skipped() {
        let events = read_all("E 5 -1 -1 -1 -1 0 0 0 0 0 2 11 22 2 1.5 3.0\n");
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.weights, vec![1.5, 3.0]);
    }

    #[test]
    fn writer_output_reads_back() {
        let original = read_all(SAMPLE).pop().unwrap().unwrap();
        let mut writer = MinimalWriter::new(Vec::new()).unwrap();
        writer.write_next(&original).unwrap();
        writer.finish().unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert!(text.contains("E 12 -1 -1 -1 -1 0 -1 2 1 2 0 1 2.5e-1"));

        let back = read_all(&text).pop().unwrap().unwrap();
        assert_eq!(back.particles(), original.particles());
        assert_eq!(back.vertices(), original.vertices());
    }

    #[test]
    fn writer_counts_particles_without_vertices() {
        let mut event = Event::new(2, Schema::Minimal);
        let a = event.add_particle(Particle::new(1, 443, 2, FourVector::ZERO)).unwrap();
        let b = event.add_particle(Particle::new(2, 13, 1, FourVector::ZERO)).unwrap();
        event.add_particle(Particle::new(3, 22, 1, FourVector::ZERO)).unwrap();
        event.add_vertex(Vertex::new(-1).with_incoming([a]).with_outgoing([b])).unwrap();

        let mut writer = MinimalWriter::new(Vec::new()).unwrap();
        writer.write_next(&event).unwrap();
        writer.write_next(&event).unwrap();
        assert_eq!(writer.detached(), 2);
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert!(!text.contains("P 3 22"));
    }

    #[test]
    fn writer_rejects_rich_events() {
        let mut writer = MinimalWriter::new(Vec::new()).unwrap();
        let err = writer.write_next(&Event::new(1, Schema::Rich)).unwrap_err();
        assert!(matches!(err, RecordError::SchemaMismatch { expected: Schema::Minimal, .. }));
    }
}
