use indexmap::IndexMap;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::action::check::{CheckError, check_actions, skip_target};
use crate::action::{Action, ActionList, ArithOp, CompareOp, CompiledProgram, Element, Store};
use crate::lang::Value;
use crate::runtime::runtime_error::RuntimeError;

/// Actor a unit runs as unless told otherwise.
pub const DEFAULT_ACTOR: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub global_capacity: u32,
    pub actor_capacity: u32,
    /// Longest array a write may produce.
    pub max_array_len: usize,
    pub max_steps: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            global_capacity: 1000,
            actor_capacity: 1000,
            max_array_len: 1000,
            max_steps: Some(1_000_000),
        }
    }
}

/// How a unit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Ran off the end of its list.
    Completed,
    /// Executed `Abort`.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreKey {
    Global,
    Actor(i64),
}

/// Reference interpreter of action lists.
///
/// Stores persist across runs, the way the target keeps variables between
/// rule executions, so a static initializer unit can run before the rules.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    global: Vec<Value>,
    actors: IndexMap<i64, Vec<Value>>,
    actor: i64,
    steps: usize,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            global: Vec::new(),
            actors: IndexMap::new(),
            actor: DEFAULT_ACTOR,
            steps: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Actions executed by the last run.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn global(&self, slot: u32) -> Value {
        self.global.get(slot as usize).cloned().unwrap_or_default()
    }

    pub fn actor_slot(&self, actor: i64, slot: u32) -> Value {
        self.actors
            .get(&actor)
            .and_then(|store| store.get(slot as usize))
            .cloned()
            .unwrap_or_default()
    }

    /// Preset a global slot, as another rule would have.
    pub fn set_global(&mut self, slot: u32, value: Value) {
        let slot = slot as usize;
        if self.global.len() <= slot {
            self.global.resize(slot + 1, Value::neutral());
        }
        self.global[slot] = value;
    }

    pub fn run(&mut self, program: &CompiledProgram, unit: &str) -> Result<Outcome, RuntimeError> {
        self.run_as(program, unit, DEFAULT_ACTOR)
    }

    pub fn run_as(
        &mut self,
        program: &CompiledProgram,
        unit: &str,
        actor: i64,
    ) -> Result<Outcome, RuntimeError> {
        let actions = program
            .unit(unit)
            .ok_or_else(|| RuntimeError::UnknownUnit(unit.to_string()))?;
        debug!("running unit '{}' as actor {}", unit, actor);
        self.run_list(actions, actor)
    }

    pub fn run_list(&mut self, actions: &ActionList, actor: i64) -> Result<Outcome, RuntimeError> {
        check_actions(actions)?;
        self.actor = actor;
        self.steps = 0;

        let len = actions.len();
        let mut ip = 0;
        while ip < len {
            self.check_limits(ip)?;
            let action = &actions.actions()[ip];
            trace!("{:04} {:?}", ip, action);

            match action {
                Action::SetVariable {
                    store,
                    slot,
                    index,
                    value,
                } => {
                    self.exec_set(ip, store, *slot, index.as_ref(), value)?;
                    ip += 1;
                }
                Action::SkipIf { condition, count } => {
                    if self.eval(ip, condition)?.truthy() {
                        ip = self.skip(ip, *count, len)?;
                    } else {
                        ip += 1;
                    }
                }
                Action::Skip { count } => ip = self.skip(ip, *count, len)?,
                Action::Abort => {
                    debug!("aborted at {:04} after {} steps", ip, self.steps);
                    return Ok(Outcome::Aborted);
                }
            }
        }

        debug!("completed after {} steps", self.steps);
        Ok(Outcome::Completed)
    }

    // Execution

    fn check_limits(&mut self, ip: usize) -> Result<(), RuntimeError> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(RuntimeError::StepLimit { ip, limit: max });
            }
        }

        Ok(())
    }

    fn skip(&self, ip: usize, count: Option<i32>, len: usize) -> Result<usize, RuntimeError> {
        count
            .and_then(|count| skip_target(ip, count, len))
            .ok_or_else(|| {
                RuntimeError::Malformed(CheckError {
                    position: ip,
                    message: "skip has no valid target".to_string(),
                })
            })
    }

    fn exec_set(
        &mut self,
        ip: usize,
        store: &Store,
        slot: u32,
        index: Option<&Element>,
        value: &Element,
    ) -> Result<(), RuntimeError> {
        let key = self.store_key(ip, store)?;
        let value = self.eval(ip, value)?;
        let index = index.map(|index| self.eval(ip, index)).transpose()?;
        let limit = self.config.max_array_len;

        let cell = self.cell_mut(ip, key, slot)?;
        let written = match index {
            None => value,
            Some(index) => {
                let at = index.as_number();
                if at < 0.0 || !at.is_finite() {
                    return Err(RuntimeError::BadIndex { ip, index: at });
                }
                let at = at as usize;
                if at >= limit {
                    return Err(RuntimeError::ArrayTooLong {
                        ip,
                        len: at + 1,
                        limit,
                    });
                }
                let mut items = match std::mem::take(cell) {
                    Value::Array(items) => items,
                    _ => Vec::new(),
                };
                if items.len() <= at {
                    items.resize(at + 1, Value::neutral());
                }
                items[at] = value;
                Value::Array(items)
            }
        };

        if let Value::Array(items) = &written {
            if items.len() > limit {
                return Err(RuntimeError::ArrayTooLong {
                    ip,
                    len: items.len(),
                    limit,
                });
            }
        }
        *cell = written;
        Ok(())
    }

    // Storage

    fn store_key(&self, ip: usize, store: &Store) -> Result<StoreKey, RuntimeError> {
        match store {
            Store::Global => Ok(StoreKey::Global),
            Store::Actor(actor) => Ok(StoreKey::Actor(self.eval(ip, actor)?.as_number() as i64)),
        }
    }

    fn capacity(&self, key: StoreKey) -> u32 {
        match key {
            StoreKey::Global => self.config.global_capacity,
            StoreKey::Actor(_) => self.config.actor_capacity,
        }
    }

    fn check_slot(&self, ip: usize, key: StoreKey, slot: u32) -> Result<(), RuntimeError> {
        let capacity = self.capacity(key);
        if slot >= capacity {
            let store = match key {
                StoreKey::Global => "global".to_string(),
                StoreKey::Actor(actor) => format!("actor {}", actor),
            };
            return Err(RuntimeError::SlotOutOfRange {
                ip,
                store,
                slot,
                capacity,
            });
        }
        Ok(())
    }

    fn read(&self, ip: usize, key: StoreKey, slot: u32) -> Result<Value, RuntimeError> {
        self.check_slot(ip, key, slot)?;
        Ok(match key {
            StoreKey::Global => self.global(slot),
            StoreKey::Actor(actor) => self.actor_slot(actor, slot),
        })
    }

    fn cell_mut(&mut self, ip: usize, key: StoreKey, slot: u32) -> Result<&mut Value, RuntimeError> {
        self.check_slot(ip, key, slot)?;
        let store = match key {
            StoreKey::Global => &mut self.global,
            StoreKey::Actor(actor) => self.actors.entry(actor).or_default(),
        };
        let slot = slot as usize;
        if store.len() <= slot {
            store.resize(slot + 1, Value::neutral());
        }
        Ok(&mut store[slot])
    }

    // Elements

    fn eval(&self, ip: usize, element: &Element) -> Result<Value, RuntimeError> {
        Ok(match element {
            Element::Number(n) => Value::Number(*n),
            Element::Bool(b) => Value::Bool(*b),
            Element::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.eval(ip, item))
                    .collect::<Result<_, _>>()?,
            ),
            Element::Variable { store, slot } => {
                let key = self.store_key(ip, store)?;
                self.read(ip, key, *slot)?
            }
            Element::ValueInArray { array, index } => {
                let array = self.eval(ip, array)?;
                let index = self.eval(ip, index)?.as_number();
                if index < 0.0 {
                    Value::neutral()
                } else {
                    array
                        .items()
                        .get(index as usize)
                        .cloned()
                        .unwrap_or_default()
                }
            }
            Element::CountOf(array) => Value::Number(self.eval(ip, array)?.items().len() as f64),
            Element::LastOf(array) => self
                .eval(ip, array)?
                .items()
                .last()
                .cloned()
                .unwrap_or_default(),
            Element::Append { array, value } => {
                let mut items = self.eval(ip, array)?.into_items();
                match self.eval(ip, value)? {
                    Value::Array(more) => items.extend(more),
                    scalar => items.push(scalar),
                }
                Value::Array(items)
            }
            Element::ArraySlice {
                array,
                start,
                count,
            } => {
                let array = self.eval(ip, array)?;
                let items = array.items();
                let start = self.eval(ip, start)?.as_number().max(0.0) as usize;
                let count = self.eval(ip, count)?.as_number();
                if count <= 0.0 || start >= items.len() {
                    Value::Array(Vec::new())
                } else {
                    let end = start.saturating_add(count as usize).min(items.len());
                    Value::Array(items[start..end].to_vec())
                }
            }
            Element::IndexOfArrayValue { array, value } => {
                let array = self.eval(ip, array)?;
                let value = self.eval(ip, value)?;
                let position = match &array {
                    Value::Array(items) => items.iter().position(|item| item.loosely_equals(&value)),
                    _ => None,
                };
                Value::Number(position.map_or(-1.0, |p| p as f64))
            }
            Element::Arithmetic { op, lhs, rhs } => {
                let a = self.eval(ip, lhs)?.as_number();
                let b = self.eval(ip, rhs)?.as_number();
                Value::Number(arith(*op, a, b))
            }
            Element::Compare { lhs, op, rhs } => {
                let a = self.eval(ip, lhs)?;
                let b = self.eval(ip, rhs)?;
                Value::Bool(compare(*op, &a, &b))
            }
            Element::And(lhs, rhs) => {
                Value::Bool(self.eval(ip, lhs)?.truthy() && self.eval(ip, rhs)?.truthy())
            }
            Element::Or(lhs, rhs) => {
                Value::Bool(self.eval(ip, lhs)?.truthy() || self.eval(ip, rhs)?.truthy())
            }
            Element::Not(inner) => Value::Bool(!self.eval(ip, inner)?.truthy()),
            Element::EventPlayer => Value::Number(self.actor as f64),
        })
    }
}

fn arith(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Subtract => a - b,
        ArithOp::Multiply => a * b,
        ArithOp::Divide if b == 0.0 => 0.0,
        ArithOp::Divide => a / b,
        ArithOp::Modulo if b == 0.0 => 0.0,
        ArithOp::Modulo => a % b,
    }
}

fn compare(op: CompareOp, a: &Value, b: &Value) -> bool {
    match op {
        CompareOp::Equal => a.loosely_equals(b),
        CompareOp::NotEqual => !a.loosely_equals(b),
        CompareOp::Less => a.as_number() < b.as_number(),
        CompareOp::LessEqual => a.as_number() <= b.as_number(),
        CompareOp::Greater => a.as_number() > b.as_number(),
        CompareOp::GreaterEqual => a.as_number() >= b.as_number(),
    }
}
