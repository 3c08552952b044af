//! Small shared value types
//!
//! - CallFlags: per-call marker bits recorded by the tracer
//! - Api: the graphics API a trace was captured from
//! - Bookmark / FrameBookmark: seek positions and per-frame index entries
//! - CaseSensitivity: search matching mode

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Global sequence number of a call within a trace
pub type CallNo = u64;

// ============================================================================
// CallFlags
// ============================================================================

/// Marker bits attached to every recorded call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CallFlags(u8);

impl CallFlags {
    /// No flags set
    pub const NONE: CallFlags = CallFlags(0);
    /// Call terminates the current frame (swap/present)
    pub const END_FRAME: CallFlags = CallFlags(1 << 0);
    /// Call opens a debug group
    pub const MARKER_PUSH: CallFlags = CallFlags(1 << 1);
    /// Call closes a debug group
    pub const MARKER_POP: CallFlags = CallFlags(1 << 2);
    /// Call issues rendering work (draw, clear, dispatch)
    pub const RENDER: CallFlags = CallFlags(1 << 3);
    /// Call has no observable side effects
    pub const NO_SIDE_EFFECTS: CallFlags = CallFlags(1 << 4);

    const KNOWN: u8 = 0b1_1111;

    /// Wrap raw bits, keeping only the known ones
    pub const fn from_bits_truncate(bits: u8) -> Self {
        CallFlags(bits & Self::KNOWN)
    }

    /// Raw bit representation
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every bit of `other` is set
    pub const fn contains(self, other: CallFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`
    pub fn insert(&mut self, other: CallFlags) {
        self.0 |= other.0;
    }

    /// Does this call end a frame?
    pub const fn is_end_frame(self) -> bool {
        self.contains(Self::END_FRAME)
    }

    /// Does this call open a debug group?
    pub const fn is_push(self) -> bool {
        self.contains(Self::MARKER_PUSH)
    }

    /// Does this call close a debug group?
    pub const fn is_pop(self) -> bool {
        self.contains(Self::MARKER_POP)
    }

    /// Does this call issue rendering work?
    pub const fn is_render(self) -> bool {
        self.contains(Self::RENDER)
    }
}

impl BitOr for CallFlags {
    type Output = CallFlags;

    fn bitor(self, rhs: CallFlags) -> CallFlags {
        CallFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for CallFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::END_FRAME, "end-frame"),
            (Self::MARKER_PUSH, "push"),
            (Self::MARKER_POP, "pop"),
            (Self::RENDER, "render"),
            (Self::NO_SIDE_EFFECTS, "no-side-effects"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("-")?;
        }
        Ok(())
    }
}

// ============================================================================
// Api
// ============================================================================

/// Graphics API a trace was recorded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Api {
    /// Not recorded in the header and not guessable from call names
    #[default]
    Unknown,
    /// OpenGL, including GLX / WGL / EGL window-system calls
    Gl,
    /// Vulkan
    Vulkan,
    /// Direct3D
    D3D,
}

impl Api {
    /// Decode the header byte; unknown values map to `Unknown`
    pub fn from_u8(b: u8) -> Self {
        match b {
            1 => Api::Gl,
            2 => Api::Vulkan,
            3 => Api::D3D,
            _ => Api::Unknown,
        }
    }

    /// Header byte for this API
    pub fn as_u8(self) -> u8 {
        match self {
            Api::Unknown => 0,
            Api::Gl => 1,
            Api::Vulkan => 2,
            Api::D3D => 3,
        }
    }

    /// Guess the API from a call name prefix
    ///
    /// Returns `None` when the name carries no recognizable prefix.
    pub fn guess_from_call_name(name: &str) -> Option<Api> {
        if name.starts_with("ID3D") || name.starts_with("D3D") {
            Some(Api::D3D)
        } else if name.starts_with("vk") {
            Some(Api::Vulkan)
        } else if name.starts_with("gl") || name.starts_with("wgl") || name.starts_with("egl") {
            Some(Api::Gl)
        } else {
            None
        }
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Api::Unknown => "unknown",
            Api::Gl => "gl",
            Api::Vulkan => "vulkan",
            Api::D3D => "d3d",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Bookmarks
// ============================================================================

/// Opaque seek position in a call stream
///
/// For file sources this is the byte offset of the next event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Bookmark {
    /// Source-defined position
    pub offset: u64,
}

impl Bookmark {
    /// Bookmark at `offset`
    pub const fn new(offset: u64) -> Self {
        Bookmark { offset }
    }
}

/// Index entry for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameBookmark {
    /// Position of the frame's first call
    pub start: Bookmark,
    /// Number of calls in the frame
    pub num_calls: u64,
}

// ============================================================================
// Text matching
// ============================================================================

/// Substring matching mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaseSensitivity {
    /// Exact byte match
    #[default]
    Sensitive,
    /// Unicode lowercase comparison
    Insensitive,
}

/// Substring test honoring `case`
pub fn text_contains(haystack: &str, needle: &str, case: CaseSensitivity) -> bool {
    match case {
        CaseSensitivity::Sensitive => haystack.contains(needle),
        CaseSensitivity::Insensitive => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}
