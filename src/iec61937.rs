/// Burst data type for AC-3.
pub const DATA_TYPE_AC3: u8 = 0x01;

/// Extended data-type marker; the real type follows in a second word, which
/// this machine does not parse.
const DATA_TYPE_EXTENDED: u8 = 0x1F;

const SYNC_WORD_0: u16 = 0xF872;
const SYNC_WORD_1: u16 = 0x4E1F;
const DATA_TYPE_MASK: u16 = 0x7F;

/// Upper bound on a burst payload, in bytes.
pub const MAX_BURST_PAYLOAD: usize = 0x10000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    First0,
    Second0,
    Third0,
    Fourth0,
    Sync0,
    Sync1,
    DataType,
    Length,
    Payload,
}

/// A completed data burst, borrowing the machine's payload buffer. Valid
/// until the next `step` call.
pub struct Burst<'a> {
    pub data_type: u8,
    pub payload: &'a [u8],
}

/// Outcome of feeding one sample through the machine.
pub struct StepResult<'a> {
    /// True when the machine is past the second sync word, i.e. committed to
    /// parsing a burst header. This is the signal the stream arbiter uses to
    /// decide that an IEC 61937 stream is present.
    pub locked: bool,
    /// Present on the step that completed a payload.
    pub burst: Option<Burst<'a>>,
}

/// Sample-level state machine that synchronizes on the IEC 61937 burst
/// preamble, parses the burst header, and reassembles complete payloads out
/// of the 16-bit sample stream. The standard guarantees at least four
/// zero-valued samples ahead of every preamble, which stretches the
/// effective sync word to 96 bits and makes false positives on PCM content
/// negligible.
///
/// Only the AC-3 data type is reassembled, because the unit of the length
/// field depends on the data type (bits for AC-3, bytes or other units for
/// everything else) and there is no safe default.
pub struct Iec61937Fsm {
    state: State,
    data_type: u8,
    payload_len: usize,
    bytes_received: usize,
    payload: Box<[u8]>,
}

impl Default for Iec61937Fsm {
    fn default() -> Self {
        Self::new()
    }
}

impl Iec61937Fsm {
    pub fn new() -> Self {
        Self {
            state: State::First0,
            data_type: 0,
            payload_len: 0,
            bytes_received: 0,
            payload: vec![0; MAX_BURST_PAYLOAD].into_boxed_slice(),
        }
    }

    /// Feed one s16le sample from the capture stream.
    ///
    /// The 61937 stream is big-endian 16-bit words inside the little-endian
    /// S/PDIF carrier, so the sample is byte-swapped here, once, at the
    /// machine boundary.
    pub fn step(&mut self, s16le_sample: u16) -> StepResult<'_> {
        let sample = s16le_sample.swap_bytes();
        let mut completed = false;

        self.state = match self.state {
            State::First0 => {
                if sample == 0 {
                    State::Second0
                } else {
                    State::First0
                }
            }
            State::Second0 => {
                if sample == 0 {
                    State::Third0
                } else {
                    State::First0
                }
            }
            State::Third0 => {
                if sample == 0 {
                    State::Fourth0
                } else {
                    State::First0
                }
            }
            State::Fourth0 => {
                if sample == 0 {
                    State::Sync0
                } else {
                    State::First0
                }
            }
            State::Sync0 => {
                // Streams commonly pad with more than four zeros, so an
                // arbitrary zero run is tolerated here.
                if sample == 0 {
                    State::Sync0
                } else if sample == SYNC_WORD_0 {
                    State::Sync1
                } else {
                    State::First0
                }
            }
            State::Sync1 => {
                if sample == SYNC_WORD_1 {
                    State::DataType
                } else {
                    State::First0
                }
            }
            State::DataType => {
                self.data_type = (sample & DATA_TYPE_MASK) as u8;
                if self.data_type == DATA_TYPE_EXTENDED {
                    // Extended headers are not supported.
                    State::First0
                } else {
                    State::Length
                }
            }
            State::Length => {
                if self.data_type == DATA_TYPE_AC3 {
                    // For AC-3 the length field is in bits.
                    self.payload_len = sample as usize / 8;
                    self.bytes_received = 0;
                    if self.payload_len == 0 {
                        // Degenerate burst, nothing to collect.
                        State::First0
                    } else {
                        State::Payload
                    }
                } else {
                    State::First0
                }
            }
            State::Payload => {
                if self.payload_len - self.bytes_received >= 2 {
                    self.payload[self.bytes_received] = (sample >> 8) as u8;
                    self.payload[self.bytes_received + 1] = sample as u8;
                    self.bytes_received += 2;
                } else {
                    // Odd payload length: the final low byte is a pad and is
                    // thrown away.
                    self.payload[self.bytes_received] = (sample >> 8) as u8;
                    self.bytes_received += 1;
                }

                if self.bytes_received == self.payload_len {
                    completed = true;
                    State::First0
                } else {
                    State::Payload
                }
            }
        };

        StepResult {
            locked: matches!(self.state, State::DataType | State::Length | State::Payload),
            burst: completed.then(|| Burst {
                data_type: self.data_type,
                payload: &self.payload[..self.bytes_received],
            }),
        }
    }

    /// Feed a chunk of packed s16le bytes through the machine, handing every
    /// completed burst to `on_burst`. Returns true if any step within the
    /// chunk reported lock. A trailing odd byte is ignored.
    pub fn process_chunk(&mut self, chunk: &[u8], mut on_burst: impl FnMut(Burst<'_>)) -> bool {
        let mut locked = false;

        for pair in chunk.chunks_exact(2) {
            let result = self.step(u16::from_le_bytes([pair[0], pair[1]]));
            locked |= result.locked;
            if let Some(burst) = result.burst {
                on_burst(burst);
            }
        }

        locked
    }
}
