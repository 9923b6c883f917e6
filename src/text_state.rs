/// Text state tracked between text-showing operators.
///
/// Saved by value on `q`, restored on `Q` and reset on `BT`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextState {
    /// Resource name of the current font (e.g. "F1")
    pub font_name: String,
    pub font_size: f64,
    /// Baseline of the last positioned line, for line break detection
    pub last_y: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_name: "default".to_string(),
            font_size: 1.0,
            last_y: 0.0,
        }
    }
}

impl TextState {
    pub fn set_font(&mut self, name: impl Into<String>, size: f64) {
        self.font_name = name.into();
        self.font_size = size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = TextState::default();
        assert_eq!(state.font_name, "default");
        assert_eq!(state.font_size, 1.0);
        assert_eq!(state.last_y, 0.0);
    }

    #[test]
    fn test_set_font() {
        let mut state = TextState::default();
        state.set_font("F2", 9.5);
        assert_eq!(state.font_name, "F2");
        assert_eq!(state.font_size, 9.5);
        assert_eq!(state.last_y, 0.0);
    }
}
