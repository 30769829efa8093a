//! Persona and recipe registries: three-source precedence merge (builtin ≺
//! user ≺ project), by name case-insensitive.

use super::{AgentType, FlatAgent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Builtin,
    User,
    Project,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Persona {
    pub name: String,
    pub agent_type: AgentType,
    pub model: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub system_prompt: String,
    #[serde(default)]
    pub context_files: Vec<String>,
    pub temperature: Option<f32>,
    #[serde(skip)]
    pub source: Source,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Recipe {
    pub name: String,
    pub description: String,
    pub agents: Vec<FlatAgent>,
    #[serde(skip)]
    pub source: Source,
}

/// Built-in personas/recipes, compiled into the binary so `paneforge` works
/// with zero configuration.
const BUILTIN_RECIPES_TOML: &str = include_str!("builtin_recipes.toml");
const BUILTIN_PERSONAS_TOML: &str = include_str!("builtin_personas.toml");

#[derive(Debug, Default, Deserialize)]
struct RecipeFile {
    #[serde(default)]
    recipe: Vec<RawRecipe>,
}

#[derive(Debug, Deserialize)]
struct RawRecipe {
    name: String,
    description: String,
    agents: Vec<RawFlatAgent>,
}

#[derive(Debug, Deserialize)]
struct RawFlatAgent {
    agent_type: AgentType,
    index: u32,
    #[serde(default)]
    model: String,
}

#[derive(Debug, Default, Deserialize)]
struct PersonaFile {
    #[serde(default)]
    persona: Vec<RawPersona>,
}

#[derive(Debug, Deserialize)]
struct RawPersona {
    name: String,
    agent_type: AgentType,
    model: String,
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    system_prompt: String,
    #[serde(default)]
    context_files: Vec<String>,
    temperature: Option<f32>,
}

/// Registry of personas and recipes with three-tier precedence. Listing is
/// sorted by name for UI use; spawn consumes a recipe's `agents` in the
/// insertion order it was declared in its source file.
#[derive(Debug, Default)]
pub struct Registry {
    personas: HashMap<String, Persona>,
    recipes: HashMap<String, Recipe>,
}

impl Registry {
    /// Load the builtin tier, then merge an optional user file and an
    /// optional project file over it (later fully replaces earlier on a
    /// case-insensitive name collision).
    pub fn load(user_toml: Option<&str>, project_toml: Option<&str>) -> anyhow::Result<Self> {
        let mut registry = Registry::default();
        registry.merge_recipes(BUILTIN_RECIPES_TOML, Source::Builtin)?;
        registry.merge_personas(BUILTIN_PERSONAS_TOML, Source::Builtin)?;
        if let Some(toml_str) = user_toml {
            registry.merge_recipes(toml_str, Source::User)?;
            registry.merge_personas(toml_str, Source::User)?;
        }
        if let Some(toml_str) = project_toml {
            registry.merge_recipes(toml_str, Source::Project)?;
            registry.merge_personas(toml_str, Source::Project)?;
        }
        Ok(registry)
    }

    fn merge_recipes(&mut self, toml_str: &str, source: Source) -> anyhow::Result<()> {
        let file: RecipeFile = toml::from_str(toml_str)?;
        for raw in file.recipe {
            let key = raw.name.to_lowercase();
            self.recipes.insert(
                key,
                Recipe {
                    name: raw.name,
                    description: raw.description,
                    agents: raw
                        .agents
                        .into_iter()
                        .map(|a| FlatAgent { agent_type: a.agent_type, index: a.index, model: a.model })
                        .collect(),
                    source,
                },
            );
        }
        Ok(())
    }

    fn merge_personas(&mut self, toml_str: &str, source: Source) -> anyhow::Result<()> {
        let file: PersonaFile = toml::from_str(toml_str)?;
        for raw in file.persona {
            let key = raw.name.to_lowercase();
            self.personas.insert(
                key,
                Persona {
                    name: raw.name,
                    agent_type: raw.agent_type,
                    model: raw.model,
                    description: raw.description,
                    tags: raw.tags,
                    system_prompt: raw.system_prompt,
                    context_files: raw.context_files,
                    temperature: raw.temperature,
                    source,
                },
            );
        }
        Ok(())
    }

    pub fn recipe(&self, name: &str) -> Option<&Recipe> {
        self.recipes.get(&name.to_lowercase())
    }

    pub fn persona(&self, name: &str) -> Option<&Persona> {
        self.personas.get(&name.to_lowercase())
    }

    /// Listing sorted by name, for UI/robot-mode enumeration.
    pub fn list_recipes(&self) -> Vec<&Recipe> {
        let mut out: Vec<&Recipe> = self.recipes.values().collect();
        out.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        out
    }

    pub fn list_personas(&self) -> Vec<&Persona> {
        let mut out: Vec<&Persona> = self.personas.values().collect();
        out.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_recipes_load() {
        let registry = Registry::load(None, None).unwrap();
        assert!(registry.recipe("pair").is_some());
        assert!(registry.recipe("trio").is_some());
    }

    #[test]
    fn builtin_reviewer_persona_loads() {
        let registry = Registry::load(None, None).unwrap();
        let reviewer = registry.persona("reviewer").unwrap();
        assert_eq!(reviewer.agent_type, AgentType::Claude);
    }

    #[test]
    fn user_tier_overrides_builtin_by_case_insensitive_name() {
        let user_toml = r#"
            [[recipe]]
            name = "PAIR"
            description = "overridden"
            agents = [{ agent_type = "claude", index = 1 }]
        "#;
        let registry = Registry::load(Some(user_toml), None).unwrap();
        let recipe = registry.recipe("pair").unwrap();
        assert_eq!(recipe.description, "overridden");
        assert_eq!(recipe.source, Source::User);
        assert_eq!(recipe.agents.len(), 1);
    }

    #[test]
    fn project_tier_beats_user_tier() {
        let user_toml = r#"
            [[recipe]]
            name = "pair"
            description = "from user"
            agents = [{ agent_type = "claude", index = 1 }]
        "#;
        let project_toml = r#"
            [[recipe]]
            name = "pair"
            description = "from project"
            agents = [{ agent_type = "codex", index = 1 }]
        "#;
        let registry = Registry::load(Some(user_toml), Some(project_toml)).unwrap();
        let recipe = registry.recipe("pair").unwrap();
        assert_eq!(recipe.description, "from project");
        assert_eq!(recipe.source, Source::Project);
    }

    #[test]
    fn listing_sorted_by_name() {
        let registry = Registry::load(None, None).unwrap();
        let names: Vec<&str> = registry.list_recipes().iter().map(|r| r.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_by_key(|n| n.to_lowercase());
        assert_eq!(names, sorted);
    }
}
