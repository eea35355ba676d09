//! State machine definition types.
//!
//! Definitions are immutable once built and can be loaded from JSON or YAML:
//!
//! ```json
//! {
//!   "identifier": "order",
//!   "initialState": "NEW",
//!   "states": {
//!     "NEW":     { "transitions": { "pay":  { "nextState": "PAID" } } },
//!     "PAID":    { "transitions": { "ship": { "nextState": "SHIPPED" } } },
//!     "SHIPPED": { "transitions": {} }
//!   }
//! }
//! ```
//!
//! Every transition target must name a declared state. That check happens
//! once, at construction, and the engine relies on it without re-checking.

use crate::error::StateMachineError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Identifier reported when a definition could not be parsed far enough to read one.
const UNPARSED: &str = "<unparsed>";

fn default_version() -> u32 {
    1
}

/// A named transition leading to another state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transition {
    name: String,
    next_state: String,
}

impl Transition {
    pub fn new(name: impl Into<String>, next_state: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_state: next_state.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the state entered when this transition succeeds.
    pub fn next_state(&self) -> &str {
        &self.next_state
    }
}

/// Anything that names a transition: a plain name or a [`Transition`].
pub trait TransitionName {
    fn transition_name(&self) -> &str;
}

impl TransitionName for str {
    fn transition_name(&self) -> &str {
        self
    }
}

impl TransitionName for String {
    fn transition_name(&self) -> &str {
        self
    }
}

impl TransitionName for Transition {
    fn transition_name(&self) -> &str {
        &self.name
    }
}

/// A state and the transitions leaving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    name: String,
    transitions: BTreeMap<String, Transition>,
}

impl State {
    pub fn new(name: impl Into<String>, transitions: impl IntoIterator<Item = Transition>) -> Self {
        Self {
            name: name.into(),
            transitions: transitions
                .into_iter()
                .map(|t| (t.name.clone(), t))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transitions(&self) -> &BTreeMap<String, Transition> {
        &self.transitions
    }

    pub fn transition(&self, name: &str) -> Option<&Transition> {
        self.transitions.get(name)
    }

    /// Returns true if a transition with this name leaves the state.
    pub fn has_transition<N: TransitionName + ?Sized>(&self, transition: &N) -> bool {
        self.transitions.contains_key(transition.transition_name())
    }

    /// True when no transition leaves this state.
    pub fn is_terminal(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// Transition as stored/transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRaw {
    /// Defaults to the key this transition is stored under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "nextState", alias = "next_state")]
    pub next_state: String,
}

/// State as stored/transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateRaw {
    /// Defaults to the key this state is stored under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub transitions: BTreeMap<String, TransitionRaw>,
}

/// Raw state machine definition as stored/transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMachineRaw {
    pub identifier: String,

    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(
        default,
        rename = "initialState",
        alias = "initial_state",
        skip_serializing_if = "Option::is_none"
    )]
    pub initial_state: Option<String>,

    #[serde(default)]
    pub states: BTreeMap<String, StateRaw>,
}

/// Validated and indexed state machine definition.
#[derive(Debug, Clone)]
pub struct StateMachine {
    identifier: String,
    version: u32,
    initial_state: Option<String>,
    states: HashMap<String, State>,

    /// Original raw definition for serialization.
    raw: StateMachineRaw,

    /// Hash of the canonical definition for integrity checks.
    checksum: String,
}

impl StateMachine {
    /// Builds a definition from already constructed states.
    pub fn new(
        identifier: impl Into<String>,
        states: impl IntoIterator<Item = State>,
    ) -> Result<Self, StateMachineError> {
        let identifier = identifier.into();
        let mut raw = StateMachineRaw {
            identifier,
            version: default_version(),
            initial_state: None,
            states: BTreeMap::new(),
        };
        for state in states {
            let entry = StateRaw {
                name: None,
                transitions: state
                    .transitions
                    .into_values()
                    .map(|t| {
                        (
                            t.name,
                            TransitionRaw {
                                name: None,
                                next_state: t.next_state,
                            },
                        )
                    })
                    .collect(),
            };
            if raw.states.insert(state.name.clone(), entry).is_some() {
                return Err(StateMachineError::invalid_definition(
                    &raw.identifier,
                    format!("duplicate state '{}'", state.name),
                ));
            }
        }
        Self::from_raw(raw)
    }

    /// Starts a fluent definition.
    pub fn builder(identifier: impl Into<String>) -> StateMachineBuilder {
        StateMachineBuilder::new(identifier)
    }

    /// Parses and validates a definition from JSON.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, StateMachineError> {
        let raw: StateMachineRaw = serde_json::from_value(json.clone())
            .map_err(|e| StateMachineError::invalid_definition(UNPARSED, e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Parses and validates a definition from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, StateMachineError> {
        let raw: StateMachineRaw = serde_json::from_str(json)
            .map_err(|e| StateMachineError::invalid_definition(UNPARSED, e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Parses and validates a definition from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, StateMachineError> {
        let raw: StateMachineRaw = serde_yaml::from_str(yaml)
            .map_err(|e| StateMachineError::invalid_definition(UNPARSED, e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Validates raw parts and indexes them.
    ///
    /// Inner `name` fields are dropped once checked against their keys, so
    /// the stored raw form and checksum do not depend on whether they were given.
    pub fn from_raw(mut raw: StateMachineRaw) -> Result<Self, StateMachineError> {
        let id = raw.identifier.as_str();
        if id.trim().is_empty() {
            return Err(StateMachineError::invalid_definition(
                UNPARSED,
                "identifier must not be empty",
            ));
        }

        let mut states = HashMap::with_capacity(raw.states.len());
        for (key, state_raw) in &raw.states {
            let name = resolve_name(id, key, state_raw.name.as_deref(), "state")?;

            let mut transitions = BTreeMap::new();
            for (t_key, t_raw) in &state_raw.transitions {
                let t_name = resolve_name(id, t_key, t_raw.name.as_deref(), "transition")?;

                // Validate target state
                if !raw.states.contains_key(&t_raw.next_state) {
                    return Err(StateMachineError::invalid_definition(
                        id,
                        format!(
                            "transition '{}' from '{}' targets unknown state '{}'",
                            t_name, name, t_raw.next_state
                        ),
                    ));
                }

                transitions.insert(
                    t_name.clone(),
                    Transition::new(t_name, t_raw.next_state.clone()),
                );
            }

            states.insert(name.clone(), State { name, transitions });
        }

        if let Some(initial) = &raw.initial_state {
            if !states.contains_key(initial) {
                return Err(StateMachineError::invalid_definition(
                    id,
                    format!("initial state '{}' not in states", initial),
                ));
            }
        }

        for state_raw in raw.states.values_mut() {
            state_raw.name = None;
            for t_raw in state_raw.transitions.values_mut() {
                t_raw.name = None;
            }
        }

        // Compute checksum
        let json_bytes = serde_json::to_vec(&raw)
            .map_err(|e| StateMachineError::invalid_definition(&raw.identifier, e.to_string()))?;
        let checksum = format!("{:08x}", crc32c::crc32c(&json_bytes));

        tracing::debug!(
            "Built state machine {} v{} ({} states, checksum {})",
            raw.identifier,
            raw.version,
            states.len(),
            checksum
        );

        Ok(Self {
            identifier: raw.identifier.clone(),
            version: raw.version,
            initial_state: raw.initial_state.clone(),
            states,
            raw,
            checksum,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn initial_state(&self) -> Option<&str> {
        self.initial_state.as_deref()
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn states(&self) -> &HashMap<String, State> {
        &self.states
    }

    /// Looks up a state by name.
    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    /// Returns true if the given state is valid for this machine.
    pub fn has_state(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    /// Returns all state names, sorted.
    pub fn state_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.states.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the transition names leaving the given state, sorted.
    pub fn transitions_from(&self, name: &str) -> Vec<&str> {
        self.states
            .get(name)
            .map(|s| s.transitions.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn raw(&self) -> &StateMachineRaw {
        &self.raw
    }

    /// Returns the raw definition as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, StateMachineError> {
        serde_json::to_value(&self.raw)
            .map_err(|e| StateMachineError::invalid_definition(&self.identifier, e.to_string()))
    }
}

fn resolve_name(
    machine: &str,
    key: &str,
    declared: Option<&str>,
    kind: &str,
) -> Result<String, StateMachineError> {
    match declared {
        Some(name) if name != key => Err(StateMachineError::invalid_definition(
            machine,
            format!("{} stored under '{}' is named '{}'", kind, key, name),
        )),
        _ => Ok(key.to_string()),
    }
}

/// Fluent builder for [`StateMachine`].
///
/// Transitions attach to the most recently declared state.
#[derive(Debug)]
pub struct StateMachineBuilder {
    raw: StateMachineRaw,
    current: Option<String>,
    problem: Option<String>,
}

impl StateMachineBuilder {
    fn new(identifier: impl Into<String>) -> Self {
        Self {
            raw: StateMachineRaw {
                identifier: identifier.into(),
                version: default_version(),
                initial_state: None,
                states: BTreeMap::new(),
            },
            current: None,
            problem: None,
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.raw.version = version;
        self
    }

    pub fn initial_state(mut self, name: impl Into<String>) -> Self {
        self.raw.initial_state = Some(name.into());
        self
    }

    /// Declares a state; following `transition` calls attach to it.
    pub fn state(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if self.raw.states.contains_key(&name) && self.problem.is_none() {
            self.problem = Some(format!("duplicate state '{}'", name));
        }
        self.raw.states.entry(name.clone()).or_default();
        self.current = Some(name);
        self
    }

    pub fn transition(mut self, name: impl Into<String>, next_state: impl Into<String>) -> Self {
        let name = name.into();
        match self
            .current
            .as_ref()
            .and_then(|current| self.raw.states.get_mut(current))
        {
            Some(state) => {
                let duplicate = state
                    .transitions
                    .insert(
                        name.clone(),
                        TransitionRaw {
                            name: None,
                            next_state: next_state.into(),
                        },
                    )
                    .is_some();
                if duplicate && self.problem.is_none() {
                    self.problem = Some(format!("duplicate transition '{}'", name));
                }
            }
            None => {
                if self.problem.is_none() {
                    self.problem = Some(format!("transition '{}' declared before any state", name));
                }
            }
        }
        self
    }

    pub fn build(self) -> Result<StateMachine, StateMachineError> {
        if let Some(reason) = self.problem {
            return Err(StateMachineError::invalid_definition(
                &self.raw.identifier,
                reason,
            ));
        }
        StateMachine::from_raw(self.raw)
    }
}
