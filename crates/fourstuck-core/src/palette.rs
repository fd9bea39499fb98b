//! Player color scheme.

use std::collections::HashMap;

use crate::model::Player;

/// Named player colors and their CSS values.
///
/// Constructed once by the shell and handed to whoever renders colors.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScheme {
    names: Vec<String>,
    fallback: String,
    css: HashMap<String, String>,
}

impl Default for ColorScheme {
    fn default() -> Self {
        let css = [
            ("red", "#ff4444"),
            ("blue", "#4444ff"),
            ("yellow", "#ffff44"),
            ("green", "#44ff44"),
            ("gray", "#888888"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            names: ["red", "blue", "yellow", "green"]
                .into_iter()
                .map(String::from)
                .collect(),
            fallback: "gray".to_string(),
            css,
        }
    }
}

impl ColorScheme {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Color name for a player, or the fallback when unassigned or unknown.
    pub fn color_of<'a>(&'a self, player: &'a Player) -> &'a str {
        match player.color.as_deref() {
            Some(c) if self.css.contains_key(c) => c,
            _ => &self.fallback,
        }
    }

    /// CSS value for a color name, falling back to the fallback color.
    pub fn css_value(&self, name: &str) -> &str {
        self.css
            .get(name)
            .or_else(|| self.css.get(&self.fallback))
            .map_or("#888888", String::as_str)
    }

    pub fn class_name(&self, name: &str) -> String {
        format!("player-{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_value_falls_back_to_gray() {
        let scheme = ColorScheme::default();
        assert_eq!(scheme.css_value("blue"), "#4444ff");
        assert_eq!(scheme.css_value("magenta"), "#888888");
        assert_eq!(scheme.class_name("red"), "player-red");
    }

    #[test]
    fn test_color_of_player() {
        let scheme = ColorScheme::default();
        let mut p = Player {
            id: 1,
            username: "ana".into(),
            points: 10,
            color: Some("green".into()),
        };
        assert_eq!(scheme.color_of(&p), "green");
        p.color = None;
        assert_eq!(scheme.color_of(&p), "gray");
    }
}
