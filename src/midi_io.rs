//! MIDI transport: device enumeration, SysEx transmission, and the
//! short note-on/note-off messages the evaluator sends, backed by
//! `midir`.

use anyhow::{anyhow, Context, Result};
use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};

/// One enumerated MIDI output device: its index and display name.
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
}

/// Lists available MIDI output devices in port order.
pub fn list_output_devices() -> Result<Vec<DeviceInfo>> {
    let midi_out = MidiOutput::new("fevolver-list")?;
    Ok(midi_out
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| DeviceInfo {
            index,
            name: midi_out.port_name(port).unwrap_or_else(|_| "unknown".to_string()),
        })
        .collect())
}

/// A connected MIDI output stream. Sending is blocking I/O; a failure
/// here is fatal for the current run.
pub struct MidiOut {
    conn: MidiOutputConnection,
}

impl MidiOut {
    /// Opens device `index`.
    pub fn open(index: usize) -> Result<Self> {
        let midi_out = MidiOutput::new("fevolver")?;
        let ports = midi_out.ports();
        let port: &MidiOutputPort = ports
            .get(index)
            .ok_or_else(|| anyhow!("no MIDI output device at index {}", index))?;
        let conn = midi_out
            .connect(port, "fevolver-out")
            .map_err(|e| anyhow!("couldn't open MIDI output {}: {}", index, e))?;
        Ok(Self { conn })
    }

    /// Sends a complete SysEx message (including `F0`/`F7` framing).
    pub fn send_sysex(&mut self, bytes: &[u8]) -> Result<()> {
        self.conn.send(bytes).context("sending SysEx over MIDI")
    }

    /// Sends a 3-byte short message (status, data1, data2).
    fn send_short(&mut self, status: u8, data1: u8, data2: u8) -> Result<()> {
        self.conn
            .send(&[status, data1 & 0x7f, data2 & 0x7f])
            .context("sending short MIDI message")
    }

    /// Note-On, status `0x90`.
    pub fn note_on(&mut self, note: u8, velocity: u8) -> Result<()> {
        self.send_short(0x90, note, velocity)
    }

    /// Note-Off, status `0x80`.
    pub fn note_off(&mut self, note: u8, velocity: u8) -> Result<()> {
        self.send_short(0x80, note, velocity)
    }
}
