//! Key Decoder
//!
//! An incremental state machine that folds raw terminal bytes into
//! semantic key events: either a complete UTF-8 code point or a named
//! control action. Callers feed one byte at a time and act only when a
//! full event is available.

use crate::editor::utf8::{classify, ByteClass};

/// A decoded key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A complete code point of printable text
    Text(char),
    Enter,
    Tab,
    Backspace,
    Delete,
    Home,
    End,
    Backward,
    Forward,
    Up,
    Down,
    PageUp,
    PageDown,
    /// ^C, discards the line
    LineKill,
    /// ^D, ends the session
    Exit,
    /// ^L, clears the screen
    Clear,
    /// ^R, starts reverse history search
    Search,
}

/// Result of feeding one byte to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decode {
    /// More bytes are needed
    Incomplete,
    Key(Key),
    /// The accumulated bytes form no valid event; accumulator dropped
    Invalid,
}

#[derive(Debug)]
enum State {
    Start,
    /// Accumulating a multi-byte code point
    Utf8 { buf: [u8; 4], len: usize, need: usize },
    /// Seen ESC
    Esc,
    /// Seen ESC [ and possibly one parameter digit
    Csi { param: Option<u8> },
    /// Seen ESC O
    Ss3,
}

pub struct KeyDecoder {
    state: State,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self { state: State::Start }
    }

    /// Feed one byte; returns an event once one is complete.
    pub fn feed(&mut self, byte: u8) -> Decode {
        match std::mem::replace(&mut self.state, State::Start) {
            State::Start => self.feed_start(byte),
            State::Utf8 { buf, len, need } => self.feed_utf8(buf, len, need, byte),
            State::Esc => match byte {
                b'[' => self.pending(State::Csi { param: None }),
                b'O' => self.pending(State::Ss3),
                _ => Decode::Invalid,
            },
            State::Csi { param } => self.feed_csi(param, byte),
            State::Ss3 => match byte {
                b'H' => Decode::Key(Key::Home),
                b'F' => Decode::Key(Key::End),
                _ => Decode::Invalid,
            },
        }
    }

    fn pending(&mut self, state: State) -> Decode {
        self.state = state;
        Decode::Incomplete
    }

    fn feed_start(&mut self, byte: u8) -> Decode {
        match byte {
            0x01 => Decode::Key(Key::Home),     // ^A
            0x02 => Decode::Key(Key::Backward), // ^B
            0x03 => Decode::Key(Key::LineKill), // ^C
            0x04 => Decode::Key(Key::Exit),     // ^D
            0x05 => Decode::Key(Key::End),      // ^E
            0x06 => Decode::Key(Key::Forward),  // ^F
            0x09 => Decode::Key(Key::Tab),
            0x0A => Decode::Key(Key::Enter),
            0x0C => Decode::Key(Key::Clear),    // ^L
            0x12 => Decode::Key(Key::Search),   // ^R
            0x1B => self.pending(State::Esc),
            0x7F => Decode::Key(Key::Backspace),
            0x00..=0x1F => Decode::Invalid,
            _ => match classify(byte) {
                ByteClass::Leading(1) => Decode::Key(Key::Text(byte as char)),
                ByteClass::Leading(need) => {
                    let mut buf = [0u8; 4];
                    buf[0] = byte;
                    self.pending(State::Utf8 { buf, len: 1, need })
                }
                _ => Decode::Invalid,
            },
        }
    }

    fn feed_utf8(&mut self, mut buf: [u8; 4], mut len: usize, need: usize, byte: u8) -> Decode {
        if classify(byte) != ByteClass::Continuation {
            return Decode::Invalid;
        }
        buf[len] = byte;
        len += 1;
        if len < need {
            return self.pending(State::Utf8 { buf, len, need });
        }
        match std::str::from_utf8(&buf[..len]) {
            Ok(s) => match s.chars().next() {
                Some(c) => Decode::Key(Key::Text(c)),
                None => Decode::Invalid,
            },
            Err(_) => Decode::Invalid,
        }
    }

    fn feed_csi(&mut self, param: Option<u8>, byte: u8) -> Decode {
        match byte {
            b'A' if param.is_none() => Decode::Key(Key::Up),
            b'B' if param.is_none() => Decode::Key(Key::Down),
            b'C' if param.is_none() => Decode::Key(Key::Forward),
            b'D' if param.is_none() => Decode::Key(Key::Backward),
            b'H' if param.is_none() => Decode::Key(Key::Home),
            b'F' if param.is_none() => Decode::Key(Key::End),
            b'0'..=b'9' if param.is_none() => self.pending(State::Csi { param: Some(byte) }),
            b'~' => match param {
                Some(b'1') | Some(b'7') => Decode::Key(Key::Home),
                Some(b'4') | Some(b'8') => Decode::Key(Key::End),
                Some(b'3') => Decode::Key(Key::Delete),
                Some(b'5') => Decode::Key(Key::PageUp),
                Some(b'6') => Decode::Key(Key::PageDown),
                _ => Decode::Invalid,
            },
            _ => Decode::Invalid,
        }
    }
}

impl Default for KeyDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut KeyDecoder, bytes: &[u8]) -> Vec<Decode> {
        bytes.iter().map(|&b| decoder.feed(b)).collect()
    }

    #[test]
    fn test_ascii_text() {
        let mut d = KeyDecoder::new();
        assert_eq!(d.feed(b'a'), Decode::Key(Key::Text('a')));
        assert_eq!(d.feed(b' '), Decode::Key(Key::Text(' ')));
        assert_eq!(d.feed(b'~'), Decode::Key(Key::Text('~')));
    }

    #[test]
    fn test_control_bytes() {
        let mut d = KeyDecoder::new();
        assert_eq!(d.feed(0x01), Decode::Key(Key::Home));
        assert_eq!(d.feed(0x03), Decode::Key(Key::LineKill));
        assert_eq!(d.feed(0x04), Decode::Key(Key::Exit));
        assert_eq!(d.feed(0x0A), Decode::Key(Key::Enter));
        assert_eq!(d.feed(0x12), Decode::Key(Key::Search));
        assert_eq!(d.feed(0x7F), Decode::Key(Key::Backspace));
    }

    #[test]
    fn test_unmapped_control_is_invalid() {
        let mut d = KeyDecoder::new();
        assert_eq!(d.feed(0x07), Decode::Invalid); // ^G
        assert_eq!(d.feed(0x1A), Decode::Invalid); // ^Z
        // Decoder recovers immediately.
        assert_eq!(d.feed(b'x'), Decode::Key(Key::Text('x')));
    }

    #[test]
    fn test_multibyte_codepoint() {
        let mut d = KeyDecoder::new();
        let bytes = "é".as_bytes();
        assert_eq!(d.feed(bytes[0]), Decode::Incomplete);
        assert_eq!(d.feed(bytes[1]), Decode::Key(Key::Text('é')));
    }

    #[test]
    fn test_four_byte_codepoint() {
        let mut d = KeyDecoder::new();
        let bytes = "🦀".as_bytes();
        let results = decode_all(&mut d, bytes);
        assert_eq!(
            results,
            vec![
                Decode::Incomplete,
                Decode::Incomplete,
                Decode::Incomplete,
                Decode::Key(Key::Text('🦀'))
            ]
        );
    }

    #[test]
    fn test_broken_utf8_dropped() {
        let mut d = KeyDecoder::new();
        assert_eq!(d.feed(0xC3), Decode::Incomplete);
        assert_eq!(d.feed(b'x'), Decode::Invalid);
        assert_eq!(d.feed(b'y'), Decode::Key(Key::Text('y')));
    }

    #[test]
    fn test_arrow_keys() {
        let mut d = KeyDecoder::new();
        assert_eq!(decode_all(&mut d, b"\x1b[A").last(), Some(&Decode::Key(Key::Up)));
        assert_eq!(decode_all(&mut d, b"\x1b[B").last(), Some(&Decode::Key(Key::Down)));
        assert_eq!(decode_all(&mut d, b"\x1b[C").last(), Some(&Decode::Key(Key::Forward)));
        assert_eq!(decode_all(&mut d, b"\x1b[D").last(), Some(&Decode::Key(Key::Backward)));
    }

    #[test]
    fn test_tilde_sequences() {
        let cases: &[(&[u8], Key)] = &[
            (b"\x1b[1~", Key::Home),
            (b"\x1b[7~", Key::Home),
            (b"\x1b[4~", Key::End),
            (b"\x1b[8~", Key::End),
            (b"\x1b[3~", Key::Delete),
            (b"\x1b[5~", Key::PageUp),
            (b"\x1b[6~", Key::PageDown),
        ];
        for (bytes, key) in cases {
            let mut d = KeyDecoder::new();
            assert_eq!(decode_all(&mut d, bytes).last(), Some(&Decode::Key(*key)));
        }
    }

    #[test]
    fn test_ss3_home_end() {
        let mut d = KeyDecoder::new();
        assert_eq!(decode_all(&mut d, b"\x1bOH").last(), Some(&Decode::Key(Key::Home)));
        assert_eq!(decode_all(&mut d, b"\x1bOF").last(), Some(&Decode::Key(Key::End)));
    }

    #[test]
    fn test_unknown_escape_dropped() {
        let mut d = KeyDecoder::new();
        assert_eq!(d.feed(0x1B), Decode::Incomplete);
        assert_eq!(d.feed(b'Z'), Decode::Invalid);
        assert_eq!(d.feed(b'q'), Decode::Key(Key::Text('q')));
    }

    #[test]
    fn test_csi_two_digit_param_rejected() {
        let mut d = KeyDecoder::new();
        assert_eq!(d.feed(0x1B), Decode::Incomplete);
        assert_eq!(d.feed(b'['), Decode::Incomplete);
        assert_eq!(d.feed(b'1'), Decode::Incomplete);
        assert_eq!(d.feed(b'5'), Decode::Invalid);
    }
}
