//! Embedded templates for sandpit files and built-in stacks.

/// Default `sandpit.toml` configuration.
pub const SANDPIT_TOML: &str = include_str!("sandpit.toml");

/// Setup script shared by the built-in stacks.
pub(crate) const SETUP_COMMON: &str = include_str!("setup_common.sh");

/// Assistant prompt for the React stack.
pub(crate) const PROMPT_REACT: &str = include_str!("prompt_react.md");

/// Assistant prompt for the React Shadcn stack.
pub(crate) const PROMPT_REACT_SHADCN: &str = include_str!("prompt_react_shadcn.md");

/// Assistant prompt for the React Pixi stack.
pub(crate) const PROMPT_REACT_PIXI: &str = include_str!("prompt_react_pixi.md");

/// Assistant prompt for the Vue stack.
pub(crate) const PROMPT_VUE: &str = include_str!("prompt_vue.md");
