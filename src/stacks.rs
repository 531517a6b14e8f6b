//! Built-in stack packs.
//!
//! A pack is the source definition of a stack. Its pack hash fingerprints
//! the parts that shape a prepared workspace (init command and registry),
//! so pool entries prepared under an older definition can be told apart.

use sha2::{Digest, Sha256};
use std::fmt::Write;

use crate::store::{Stack, StackId};
use crate::templates;

/// Hex characters kept from the SHA-256 digest.
const PACK_HASH_LEN: usize = 12;

/// Source definition of a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackPack {
    /// Unique title, used to match packs to stored stacks.
    pub title: &'static str,
    /// Short description shown to users.
    pub description: &'static str,
    /// Registry reference of the environment image.
    pub from_registry: &'static str,
    /// One-shot setup run when a workspace is prepared.
    pub init_command: String,
    /// Dev-server command.
    pub start_command: String,
    /// Assistant prompt.
    pub prompt: &'static str,
    /// Expected setup time hint.
    pub setup_time_seconds: u32,
}

impl StackPack {
    /// Fingerprint of the init command and registry.
    pub fn pack_hash(&self) -> String {
        pack_hash(&self.init_command, self.from_registry)
    }

    /// Converts the pack into a stack record with the given id.
    pub fn to_stack(&self, id: StackId) -> Stack {
        Stack {
            id,
            title: self.title.to_string(),
            description: self.description.to_string(),
            from_registry: self.from_registry.to_string(),
            init_command: Some(self.init_command.clone()),
            start_command: self.start_command.clone(),
            prompt: self.prompt.trim().to_string(),
            pack_hash: self.pack_hash(),
            setup_time_seconds: self.setup_time_seconds,
        }
    }
}

/// First 12 hex characters of SHA-256 over `init_command` followed by
/// `from_registry`.
pub fn pack_hash(init_command: &str, from_registry: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(init_command.as_bytes());
    hasher.update(from_registry.as_bytes());
    let digest = hasher.finalize();

    let mut out = String::with_capacity(64);
    for b in digest {
        let _ = write!(&mut out, "{b:02x}");
    }
    out.truncate(PACK_HASH_LEN);
    out
}

/// The stacks every deployment starts with.
pub fn default_packs() -> Vec<StackPack> {
    let setup = templates::SETUP_COMMON.trim().to_string();
    let start_frontend = format!("{setup}\ncd frontend\nbun run dev");

    vec![
        StackPack {
            title: "React",
            description: "A simple React App with TypeScript and Vite. Best for starting from scratch with minimal components.",
            from_registry: "ghcr.io/sandpit/stacks/react-vanilla:latest",
            init_command: setup.clone(),
            start_command: start_frontend.clone(),
            prompt: templates::PROMPT_REACT,
            setup_time_seconds: 60,
        },
        StackPack {
            title: "React Shadcn",
            description: "A React app with Shadcn UI and TypeScript. Best for building a modern web app with a modern UI.",
            from_registry: "ghcr.io/sandpit/stacks/react-shadcn:latest",
            init_command: setup.clone(),
            start_command: start_frontend.clone(),
            prompt: templates::PROMPT_REACT_SHADCN,
            setup_time_seconds: 60,
        },
        StackPack {
            title: "React Pixi",
            description: "A React app with Pixi.js and TypeScript. Best for games, animations, and interactive graphics.",
            from_registry: "ghcr.io/sandpit/stacks/react-pixi:latest",
            init_command: setup.clone(),
            start_command: start_frontend.clone(),
            prompt: templates::PROMPT_REACT_PIXI,
            setup_time_seconds: 60,
        },
        StackPack {
            title: "Vue",
            description: "A Vue 3 app with TypeScript and Vite. Best for starting from scratch with minimal components.",
            from_registry: "ghcr.io/sandpit/stacks/vue-vanilla:latest",
            init_command: setup,
            start_command: start_frontend,
            prompt: templates::PROMPT_VUE,
            setup_time_seconds: 60,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_pack_hash_format() {
        let hash = pack_hash("echo init", "registry/image:latest");
        assert_eq!(hash.len(), PACK_HASH_LEN);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_pack_hash_known_value() {
        // sha256("") = e3b0c44298fc1c149afbf4c8996fb924...
        assert_eq!(pack_hash("", ""), "e3b0c44298fc");
    }

    #[test]
    fn test_pack_hash_depends_on_both_inputs() {
        let base = pack_hash("echo init", "registry/a");
        assert_ne!(base, pack_hash("echo init2", "registry/a"));
        assert_ne!(base, pack_hash("echo init", "registry/b"));
        assert_eq!(base, pack_hash("echo init", "registry/a"));
    }

    #[test]
    fn test_default_packs_have_unique_titles_and_hashes() {
        let packs = default_packs();
        assert_eq!(packs.len(), 4);

        let titles: HashSet<_> = packs.iter().map(|p| p.title).collect();
        assert_eq!(titles.len(), packs.len());

        let hashes: HashSet<_> = packs.iter().map(StackPack::pack_hash).collect();
        assert_eq!(hashes.len(), packs.len());
    }

    #[test]
    fn test_to_stack() {
        let pack = &default_packs()[0];
        let stack = pack.to_stack(3);
        assert_eq!(stack.id, 3);
        assert_eq!(stack.title, "React");
        assert_eq!(stack.pack_hash, pack.pack_hash());
        assert!(stack.start_command.ends_with("bun run dev"));
        assert!(stack.prompt.starts_with("You are building a React app"));
    }
}
