//! Partonic states from Les Houches event files.
//!
//! Each `<event>` block holds a header line
//! `NUP IDPRUP XWGTUP SCALUP AQEDUP AQCDUP` followed by `NUP` particle lines
//! `IDUP ISTUP MOTHUP1 MOTHUP2 ICOLUP1 ICOLUP2 PX PY PZ E M VTIMUP SPINUP`.
//! Anything after the particle lines (reweighting blocks, comments) is
//! ignored.
//!
//! Particles get identifiers `1..=NUP` in line order and rich-schema status
//! codes. Incoming partons meet at a hard vertex (`-1`); every particle with
//! daughters gets its own decay vertex.

use std::collections::BTreeMap;
use std::io::BufRead;

use dps_types::{ColourTag, Event, FourVector, Particle, ParticleIndex, PartonicState, Schema, Vertex, VertexId};

use crate::PartonSource;
use crate::block::{Line, RawLine, read_text_line};
use crate::error::RecordError;
use crate::fields::Fields;

/// Rich code for an incoming hard-process parton.
const STATUS_INCOMING: i32 = -21;
/// Rich code for an intermediate resonance of the hard process.
const STATUS_RESONANCE: i32 = -22;
/// Rich code for an outgoing hard-process particle.
const STATUS_OUTGOING: i32 = 23;
/// Rich code for a documentation-only line.
const STATUS_DOCUMENTATION: i32 = -23;
/// Rich code for a beam remnant line.
const STATUS_BEAM: i32 = -12;

/// Map an LHE `ISTUP` to a rich-schema status.
const fn rich_status(istup: i32) -> Option<i32> {
    match istup {
        -1 | -2 => Some(STATUS_INCOMING),
        1 => Some(STATUS_OUTGOING),
        2 => Some(STATUS_RESONANCE),
        3 => Some(STATUS_DOCUMENTATION),
        -9 => Some(STATUS_BEAM),
        _ => None,
    }
}

/// Reads partonic states from an LHE stream.
pub struct LheReader<R> {
    inner: R,
    line_no: usize,
    produced: u64,
    finished: bool,
}

impl<R: BufRead> LheReader<R> {
    /// Wrap a buffered input stream.
    pub const fn new(inner: R) -> Self {
        Self {
            inner,
            line_no: 0,
            produced: 0,
            finished: false,
        }
    }

    fn read_line(&mut self) -> Result<Option<RawLine>, RecordError> {
        let raw = read_text_line(&mut self.inner, &mut self.line_no)?;
        Ok(raw.map(|((line, text), valid)| ((line, text.trim_start().to_owned()), valid)))
    }

    /// Lines between the next `<event>` and `</event>` tags.
    fn next_block(&mut self) -> Result<Option<(usize, Vec<Line>)>, RecordError> {
        if self.finished {
            return Ok(None);
        }
        let (start, mut undecodable) = loop {
            match self.read_line()? {
                Some(((line, text), valid)) if text.starts_with("<event") => break (line, (!valid).then_some(line)),
                Some(((_, text), _)) if text.starts_with("</LesHouchesEvents") => {
                    self.finished = true;
                    return Ok(None);
                }
                Some(_) => {}
                None => {
                    self.finished = true;
                    return Ok(None);
                }
            }
        };
        let mut lines = Vec::new();
        loop {
            match self.read_line()? {
                Some(((_, text), _)) if text.starts_with("</event") => break,
                Some((line, valid)) => {
                    if !valid {
                        undecodable.get_or_insert(line.0);
                    }
                    lines.push(line);
                }
                None => {
                    self.finished = true;
                    return Err(RecordError::malformed(start, "unterminated <event> block"));
                }
            }
        }
        match undecodable {
            Some(line) => Err(RecordError::malformed(line, "line is not valid UTF-8")),
            None => Ok(Some((start, lines))),
        }
    }
}

impl<R: BufRead> PartonSource for LheReader<R> {
    fn next_state(&mut self) -> Result<Option<PartonicState>, RecordError> {
        let Some(block) = self.next_block().transpose() else {
            return Ok(None);
        };
        self.produced = self.produced.saturating_add(1);
        let (start, lines) = block?;
        parse_event(self.produced, start, &lines).map(Some)
    }
}

/// One particle line before vertices are built.
struct Entry {
    istup: i32,
    mother: usize,
}

fn parse_event(number: u64, start: usize, lines: &[Line]) -> Result<PartonicState, RecordError> {
    let mut records = lines.iter().filter(|(_, text)| !text.is_empty());
    let (header_line, header) = records
        .next()
        .ok_or_else(|| RecordError::malformed(start, "empty <event> block"))?;
    let mut fields = Fields::new(*header_line, header);
    let count: usize = fields.parse("particle count")?;
    fields.skip(1, "process id")?;
    let weight: f64 = fields.parse("event weight")?;

    let mut event = Event::new(number, Schema::Rich).with_weight(weight);
    let mut colours = Vec::new();
    let mut entries = Vec::new();
    for id in 1..=count {
        let (line, text) = records
            .next()
            .filter(|(_, text)| !text.starts_with('<') && !text.starts_with('#'))
            .ok_or_else(|| RecordError::malformed(start, format!("expected {count} particle lines")))?;
        let mut fields = Fields::new(*line, text);
        let pdg: i32 = fields.parse("IDUP")?;
        let istup: i32 = fields.parse("ISTUP")?;
        let mother: usize = fields.parse("MOTHUP1")?;
        fields.skip(1, "MOTHUP2")?;
        let colour = ColourTag::new(fields.parse("ICOLUP1")?, fields.parse("ICOLUP2")?);
        let momentum = FourVector::new(
            fields.parse("PX")?,
            fields.parse("PY")?,
            fields.parse("PZ")?,
            fields.parse("E")?,
        );
        let mass: f64 = fields.parse("M")?;

        let status = rich_status(istup)
            .ok_or_else(|| RecordError::malformed(*line, format!("unknown ISTUP {istup}")))?;
        if mother > count {
            return Err(RecordError::malformed(*line, format!("mother {mother} out of range")));
        }
        let id = i64::try_from(id).map_err(|e| RecordError::malformed(*line, e.to_string()))?;
        event
            .add_particle(Particle::new(id, pdg, status, momentum).with_mass(mass))
            .map_err(|e| RecordError::malformed(*line, e.to_string()))?;
        colours.push(colour);
        entries.push(Entry { istup, mother });
    }
    if let Some((line, _)) = records.next().filter(|(_, text)| !text.starts_with('<') && !text.starts_with('#')) {
        return Err(RecordError::malformed(*line, format!("more particle lines than the {count} announced")));
    }

    let is_incoming = |mother: usize| {
        mother
            .checked_sub(1)
            .and_then(|m| entries.get(m))
            .is_none_or(|e| e.istup < 0)
    };
    let mut hard = Vertex::new(-1);
    let mut decays: BTreeMap<usize, Vec<ParticleIndex>> = BTreeMap::new();
    for (i, entry) in entries.iter().enumerate() {
        let index = ParticleIndex(i);
        if entry.istup < 0 {
            hard.incoming.push(index);
        } else if is_incoming(entry.mother) {
            hard.outgoing.push(index);
        } else {
            decays.entry(entry.mother).or_default().push(index);
        }
    }
    event
        .add_vertex(hard)
        .map_err(|e| RecordError::malformed(start, e.to_string()))?;
    for (mother, daughters) in decays {
        let parent = ParticleIndex(mother.saturating_sub(1));
        let id: VertexId = event.next_vertex_id();
        event
            .add_vertex(Vertex::new(id).with_incoming([parent]).with_outgoing(daughters))
            .map_err(|e| RecordError::malformed(start, e.to_string()))?;
    }
    Ok(PartonicState::new(event, colours))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use dps_types::ParticleStatus;

    use super::*;

    const SAMPLE: &str = "\
<LesHouchesEvents version=\"3.0\">
<init>
2212 2212 6.8e3 6.8e3 0 0 0 0 3 1
</init>
<event>
 5 1 2.5e-3 91.2 7.8e-3 0.118
 21 -1 0 0 501 502 0 0 300 300 0 0 9
 21 -1 0 0 502 503 0 0 -200 200 0 0 9
 443 2 1 2 0 0 1 2 100 120 3.097 0 9
 21 1 1 2 501 503 -1 -2 0 2.2 0 0 9
 13 1 3 3 0 0 0.5 1 50 50.1 0.1057 0 9
<mgrwt>
</mgrwt>
</event>
<event>
 1 1 1.0 91.2 7.8e-3 0.118
 21 7 0 0 501 502 0 0 300 300 0 0 9
</event>
<event>
 1 1 0.5 91.2 7.8e-3 0.118
 22 -1 0 0 0 0 0 0 5 5 0 0 9
</event>
</LesHouchesEvents>
";

    #[test]
    fn builds_hard_and_decay_vertices() {
        let mut reader = LheReader::new(SAMPLE.as_bytes());
        let state = reader.next_state().unwrap().unwrap();
        let event = &state.event;
        assert_eq!(event.number, 1);
        assert_eq!(event.schema, Schema::Rich);
        assert!((event.weight() - 2.5e-3).abs() < 1e-15);
        assert_eq!(event.particle_count(), 5);
        assert_eq!(event.vertex_count(), 2);

        let hard = &event.vertices()[0];
        assert_eq!(hard.incoming, vec![ParticleIndex(0), ParticleIndex(1)]);
        assert_eq!(hard.outgoing, vec![ParticleIndex(2), ParticleIndex(3)]);
        let decay = &event.vertices()[1];
        assert_eq!(decay.incoming, vec![ParticleIndex(2)]);
        assert_eq!(decay.outgoing, vec![ParticleIndex(4)]);

        assert_eq!(event.status_of(&event.particles()[2]), ParticleStatus::Intermediate(22));
        assert!(event.status_of(&event.particles()[3]).is_final());
        assert_eq!(state.colour_of(ParticleIndex(1)), ColourTag::new(502, 503));
    }

    #[test]
    fn bad_event_does_not_stop_the_stream() {
        let mut reader = LheReader::new(SAMPLE.as_bytes());
        reader.next_state().unwrap();
        let err = reader.next_state().unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("ISTUP 7"));
        let third = reader.next_state().unwrap().unwrap();
        assert_eq!(third.event.number, 3);
        assert!(reader.next_state().unwrap().is_none());
    }

    #[test]
    fn short_particle_list_is_malformed() {
        let text = "<event>\n 3 1 1.0 0 0 0\n 21 -1 0 0 501 502 0 0 300 300 0 0 9\n</event>\n";
        let mut reader = LheReader::new(text.as_bytes());
        assert!(reader.next_state().unwrap_err().to_string().contains("expected 3 particle lines"));
    }

    #[test]
    fn absurd_particle_count_is_malformed() {
        let text = "<event>\n18446744073709551615 1 1.0 0 0 0\n 21 -1 0 0 501 502 0 0 300 300 0 0 9\n</event>\n";
        let mut reader = LheReader::new(text.as_bytes());
        let err = reader.next_state().unwrap_err();
        assert!(err.is_recoverable());
        assert!(reader.next_state().unwrap().is_none());
    }

    #[test]
    fn surplus_particle_lines_are_malformed() {
        let text = "<event>\n 1 1 1.0 0 0 0\n 21 -1 0 0 501 502 0 0 300 300 0 0 9\n 21 -1 0 0 502 503 0 0 -200 200 0 0 9\n</event>\n";
        let mut reader = LheReader::new(text.as_bytes());
        let err = reader.next_state().unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("more particle lines than the 1 announced"));
    }

    #[test]
    fn undecodable_event_is_skipped() {
        let mut text = b"<event>\n 1 1 1.0 0 0 0\n 21 -1 0 0 501 502 0 0 300 300 0 0 9 \xff\n</event>\n".to_vec();
        text.extend_from_slice(b"<event>\n 1 1 0.5 0 0 0\n 22 -1 0 0 0 0 0 0 5 5 0 0 9\n</event>\n");
        let mut reader = LheReader::new(text.as_slice());
        let err = reader.next_state().unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("line 3"));
        let next = reader.next_state().unwrap().unwrap();
        assert_eq!(next.event.number, 2);
    }

    #[test]
    fn unterminated_block_ends_stream() {
        let mut reader = LheReader::new("<event>\n 1 1 1.0 0 0 0\n".as_bytes());
        assert!(reader.next_state().is_err());
        assert!(reader.next_state().unwrap().is_none());
    }
}
