//! Frame tags and their discriminator encodings.
//!
//! The legacy format sends ASCII tokens with no length prefix. The three
//! tokens start with distinct bytes, so the first byte alone fixes the width
//! of the rest of the token.

/// Legacy RGB discriminator.
pub const TOKEN_RGB: &[u8] = b"RGB";
/// Legacy DEPTH discriminator.
pub const TOKEN_DEPTH: &[u8] = b"DEPTH";
/// Legacy STOP discriminator (termination, no length or payload).
pub const TOKEN_STOP: &[u8] = b"STOP";

/// Compact STOP discriminator.
pub const BYTE_STOP: u8 = 0x00;
/// Compact RGB discriminator.
pub const BYTE_RGB: u8 = 0x01;
/// Compact DEPTH discriminator.
pub const BYTE_DEPTH: u8 = 0x02;

/// Which data stream a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameTag {
    Rgb,
    Depth,
}

impl FrameTag {
    /// All tags, in the order a sender polls them each iteration.
    pub const ALL: [FrameTag; 2] = [FrameTag::Rgb, FrameTag::Depth];

    /// Legacy ASCII token.
    pub fn token(self) -> &'static [u8] {
        match self {
            FrameTag::Rgb => TOKEN_RGB,
            FrameTag::Depth => TOKEN_DEPTH,
        }
    }

    /// Compact single-byte discriminator.
    pub fn byte(self) -> u8 {
        match self {
            FrameTag::Rgb => BYTE_RGB,
            FrameTag::Depth => BYTE_DEPTH,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            FrameTag::Rgb => "RGB",
            FrameTag::Depth => "DEPTH",
        }
    }
}

impl std::fmt::Display for FrameTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded discriminator: a data tag or the termination signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discriminator {
    Data(FrameTag),
    Stop,
}

impl Discriminator {
    /// Full legacy token that starts with `first`, if any.
    pub fn legacy_token_for(first: u8) -> Option<&'static [u8]> {
        match first {
            b'R' => Some(TOKEN_RGB),
            b'D' => Some(TOKEN_DEPTH),
            b'S' => Some(TOKEN_STOP),
            _ => None,
        }
    }

    /// Parse a complete legacy token.
    pub fn from_legacy_token(token: &[u8]) -> Option<Self> {
        match token {
            TOKEN_RGB => Some(Discriminator::Data(FrameTag::Rgb)),
            TOKEN_DEPTH => Some(Discriminator::Data(FrameTag::Depth)),
            TOKEN_STOP => Some(Discriminator::Stop),
            _ => None,
        }
    }

    /// Parse a compact discriminator byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            BYTE_RGB => Some(Discriminator::Data(FrameTag::Rgb)),
            BYTE_DEPTH => Some(Discriminator::Data(FrameTag::Depth)),
            BYTE_STOP => Some(Discriminator::Stop),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_tokens_are_prefix_free() {
        for token in [TOKEN_RGB, TOKEN_DEPTH, TOKEN_STOP] {
            assert_eq!(Discriminator::legacy_token_for(token[0]), Some(token));
        }
        assert_eq!(Discriminator::legacy_token_for(b'X'), None);
    }

    #[test]
    fn compact_bytes_map_back() {
        for tag in FrameTag::ALL {
            assert_eq!(
                Discriminator::from_byte(tag.byte()),
                Some(Discriminator::Data(tag))
            );
            assert_eq!(
                Discriminator::from_legacy_token(tag.token()),
                Some(Discriminator::Data(tag))
            );
        }
        assert_eq!(Discriminator::from_byte(BYTE_STOP), Some(Discriminator::Stop));
        assert_eq!(Discriminator::from_byte(0x7f), None);
    }
}
