//! Types and constants shared by the engine and the renderer

pub type Vec3 = [f32; 3];

/// Logical size of the current render target. Signed because it feeds
/// screen-coordinate arithmetic in the 2D and HUD code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VidDef {
    pub width: i32,
    pub height: i32,
}

// error codes for com_error
pub const ERR_FATAL: i32 = 0;
pub const ERR_DROP: i32 = 1;

// print levels
pub const PRINT_ALL: i32 = 0;
/// Only shown with developer output enabled.
pub const PRINT_DEVELOPER: i32 = 1;
pub const PRINT_ALERT: i32 = 2;

// cvar flags
/// Written to the config file.
pub const CVAR_ARCHIVE: i32 = 1;
/// Read-only from the console.
pub const CVAR_NOSET: i32 = 8;
/// Changes wait for a renderer restart.
pub const CVAR_LATCH: i32 = 16;

pub const MAX_STRING_TOKENS: usize = 80;

/// Eye height of the player in world units and in metres, used to bring
/// real-world distances such as the IPD into world space.
pub const PLAYER_HEIGHT_UNITS: f32 = 56.0;
pub const PLAYER_HEIGHT_M: f32 = 1.75;

/// Numeric value of a console string: the longest leading number, or 0.
pub fn atof(s: &str) -> f32 {
    let s = s.trim();
    if let Ok(v) = s.parse::<f32>() {
        return v;
    }
    let mut seen_dot = false;
    let end = s
        .char_indices()
        .find(|&(i, c)| {
            let numeric = c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+')) || (c == '.' && !seen_dot);
            seen_dot |= c == '.';
            !numeric
        })
        .map_or(s.len(), |(i, _)| i);
    s[..end].parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atof() {
        assert_eq!(atof("1.5"), 1.5);
        assert_eq!(atof(" 42 "), 42.0);
        assert_eq!(atof("3abc"), 3.0);
        assert_eq!(atof("-2.25x"), -2.25);
        assert_eq!(atof("1.2.3"), 1.2);
        assert_eq!(atof("abc"), 0.0);
        assert_eq!(atof(""), 0.0);
    }
}
