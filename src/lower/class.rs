//! Class layout and instance storage.
//!
//! Instances are struct-of-arrays: every instance field has one global slot
//! (its field stack) holding an array indexed by instance handle. A derived
//! class's own fields take the stack indices right after its base's, so a
//! base field lives in the same stack for every descendant.

use indexmap::IndexMap;
use log::debug;

use crate::action::{Action, ActionList, CompareOp, Element};
use crate::lang::{ClassDecl, ConstructorDecl, FieldDecl, MethodDecl, PoolKind};

use super::config::LowerConfig;
use super::error::LowerError;
use super::memory::MemoryPool;
use super::variable::{IndexedVar, Variable};

// =============================================================================
// LAYOUT
// =============================================================================

/// An instance field with its assigned stack.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSlot {
    pub name: String,
    /// Class that declares the field.
    pub owner: String,
    pub stack: u32,
}

/// Flat field table of one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassLayout {
    pub name: String,
    pub base: Option<String>,
    /// Root first, this class last.
    pub chain: Vec<String>,
    /// Own instance fields, in declaration order.
    pub fields: Vec<FieldSlot>,
    /// First stack index of the own fields; the base's stack count.
    pub stack_start: u32,
}

impl ClassLayout {
    /// One past the last stack this class uses.
    pub fn stack_end(&self) -> u32 {
        self.stack_start + self.fields.len() as u32
    }
}

/// Every class of the program with its layout, built once per compile pass.
#[derive(Debug, Default)]
pub struct ClassTable {
    decls: IndexMap<String, ClassDecl>,
    layouts: IndexMap<String, ClassLayout>,
}

impl ClassTable {
    pub fn build(classes: &[ClassDecl]) -> Result<Self, LowerError> {
        let mut decls = IndexMap::new();
        for class in classes {
            if decls.insert(class.name.clone(), class.clone()).is_some() {
                return Err(LowerError::invariant(format!(
                    "class '{}' declared twice",
                    class.name
                ))
                .with_span(class.span));
            }
        }

        let mut table = ClassTable {
            decls,
            layouts: IndexMap::new(),
        };
        let names: Vec<String> = table.decls.keys().cloned().collect();
        for name in names {
            table.layout_of(&name, &mut Vec::new())?;
        }
        Ok(table)
    }

    fn layout_of(&mut self, name: &str, visiting: &mut Vec<String>) -> Result<u32, LowerError> {
        if let Some(layout) = self.layouts.get(name) {
            return Ok(layout.stack_end());
        }
        if visiting.iter().any(|v| v == name) {
            return Err(LowerError::unsupported(
                format!("class '{}'", name),
                format!("inheritance cycle through {}", visiting.join(" -> ")),
            ));
        }
        let decl = self
            .decls
            .get(name)
            .cloned()
            .ok_or_else(|| LowerError::invariant(format!("unknown class '{}'", name)))?;

        visiting.push(name.to_string());
        let (stack_start, mut chain) = match &decl.extends {
            Some(base) => {
                if !self.decls.contains_key(base) {
                    return Err(LowerError::invariant(format!(
                        "class '{}' extends unknown class '{}'",
                        name, base
                    ))
                    .with_span(decl.span));
                }
                let start = self.layout_of(base, visiting)?;
                let chain = self
                    .layouts
                    .get(base)
                    .map(|layout| layout.chain.clone())
                    .unwrap_or_default();
                (start, chain)
            }
            None => (0, Vec::new()),
        };
        visiting.pop();
        chain.push(name.to_string());

        let fields: Vec<FieldSlot> = decl
            .fields
            .iter()
            .filter(|field| !field.is_static)
            .enumerate()
            .map(|(i, field)| FieldSlot {
                name: field.name.clone(),
                owner: name.to_string(),
                stack: stack_start + i as u32,
            })
            .collect();

        let layout = ClassLayout {
            name: name.to_string(),
            base: decl.extends.clone(),
            chain,
            fields,
            stack_start,
        };
        debug!(
            "layout {}: stacks {}..{}",
            name,
            layout.stack_start,
            layout.stack_end()
        );
        let end = layout.stack_end();
        self.layouts.insert(name.to_string(), layout);
        Ok(end)
    }

    pub fn layout(&self, class: &str) -> Result<&ClassLayout, LowerError> {
        self.layouts
            .get(class)
            .ok_or_else(|| LowerError::invariant(format!("unknown class '{}'", class)))
    }

    pub fn decl(&self, class: &str) -> Result<&ClassDecl, LowerError> {
        self.decls
            .get(class)
            .ok_or_else(|| LowerError::invariant(format!("unknown class '{}'", class)))
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDecl> {
        self.decls.values()
    }

    /// Chain of `class`, most derived first.
    fn walk_up(&self, class: &str) -> Result<Vec<&ClassDecl>, LowerError> {
        let layout = self.layout(class)?;
        Ok(layout
            .chain
            .iter()
            .rev()
            .filter_map(|name| self.decls.get(name))
            .collect())
    }

    /// Every instance field of `class`, base first.
    pub fn all_fields(&self, class: &str) -> Result<Vec<&FieldSlot>, LowerError> {
        let layout = self.layout(class)?;
        let mut fields = Vec::new();
        for name in &layout.chain {
            fields.extend(self.layout(name)?.fields.iter());
        }
        Ok(fields)
    }

    /// Declaration of an instance field, with its initializer.
    pub fn field_decl(&self, slot: &FieldSlot) -> Result<&FieldDecl, LowerError> {
        self.decl(&slot.owner)?
            .fields
            .iter()
            .find(|field| !field.is_static && field.name == slot.name)
            .ok_or_else(|| LowerError::invariant(format!("lost field {}.{}", slot.owner, slot.name)))
    }

    /// Resolve an instance field from the static type, walking to the
    /// declaring class.
    pub fn find_field(&self, class: &str, field: &str) -> Result<&FieldSlot, LowerError> {
        for name in self.layout(class)?.chain.iter().rev() {
            if let Some(slot) = self.layout(name)?.fields.iter().find(|f| f.name == field) {
                return Ok(slot);
            }
        }
        Err(LowerError::invariant(format!(
            "class '{}' has no instance field '{}'",
            class, field
        )))
    }

    /// Resolve a static field; returns the declaring class and the decl.
    pub fn find_static(&self, class: &str, field: &str) -> Result<(&str, &FieldDecl), LowerError> {
        for decl in self.walk_up(class)? {
            if let Some(found) = decl.fields.iter().find(|f| f.is_static && f.name == field) {
                return Ok((decl.name.as_str(), found));
            }
        }
        Err(LowerError::invariant(format!(
            "class '{}' has no static field '{}'",
            class, field
        )))
    }

    /// Resolve a method from the static type; returns the declaring class.
    pub fn find_method(&self, class: &str, method: &str) -> Result<(&str, &MethodDecl), LowerError> {
        for decl in self.walk_up(class)? {
            if let Some(found) = decl.methods.iter().find(|m| m.name == method) {
                return Ok((decl.name.as_str(), found));
            }
        }
        Err(LowerError::invariant(format!(
            "class '{}' has no method '{}'",
            class, method
        )))
    }

    /// Constructor `index` of `class`. A class with no constructors has an
    /// empty one at index 0.
    pub fn constructor(&self, class: &str, index: usize) -> Result<ConstructorDecl, LowerError> {
        let decl = self.decl(class)?;
        if decl.constructors.is_empty() && index == 0 {
            return Ok(ConstructorDecl::default());
        }
        decl.constructors.get(index).cloned().ok_or_else(|| {
            LowerError::invariant(format!("class '{}' has no constructor #{}", class, index))
        })
    }
}

// =============================================================================
// STORAGE
// =============================================================================

/// Global slots backing class instances: the handle table, one slot per
/// field stack, and one plain slot per static field.
#[derive(Debug, Default)]
pub struct ClassData {
    table: Option<IndexedVar>,
    stacks: Vec<IndexedVar>,
    statics: IndexMap<String, IndexedVar>,
}

impl ClassData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Array of liveness flags indexed by handle.
    pub fn handle_table(&mut self, pool: &mut MemoryPool) -> Result<IndexedVar, LowerError> {
        if let Some(table) = &self.table {
            return Ok(table.clone());
        }
        let slot = pool.allocate("__class_handles")?;
        let table = IndexedVar::new("__class_handles", PoolKind::Global, slot);
        self.table = Some(table.clone());
        Ok(table)
    }

    /// The stack at `index`, created on first use. Stacks are created in
    /// index order; asking past the next one is a layout defect.
    pub fn field_stack(&mut self, pool: &mut MemoryPool, index: u32) -> Result<IndexedVar, LowerError> {
        let index = index as usize;
        if let Some(stack) = self.stacks.get(index) {
            return Ok(stack.clone());
        }
        if index > self.stacks.len() {
            return Err(LowerError::invariant(format!(
                "field stack {} skipped ({} created)",
                index,
                self.stacks.len()
            )));
        }
        let name = format!("__field_stack_{}", index);
        let slot = pool.allocate(&name)?;
        let stack = IndexedVar::new(name, PoolKind::Global, slot);
        self.stacks.push(stack.clone());
        Ok(stack)
    }

    /// Create every stack `layout` reaches, in order.
    pub fn prepare(&mut self, pool: &mut MemoryPool, layout: &ClassLayout) -> Result<(), LowerError> {
        for index in 0..layout.stack_end() {
            self.field_stack(pool, index)?;
        }
        Ok(())
    }

    pub fn stack_count(&self) -> usize {
        self.stacks.len()
    }

    pub fn static_field(
        &mut self,
        pool: &mut MemoryPool,
        class: &str,
        field: &str,
    ) -> Result<IndexedVar, LowerError> {
        let key = format!("{}.{}", class, field);
        if let Some(var) = self.statics.get(&key) {
            return Ok(var.clone());
        }
        let slot = pool.allocate(&key)?;
        let var = IndexedVar::new(key.clone(), PoolKind::Global, slot);
        self.statics.insert(key, var.clone());
        Ok(var)
    }

    /// Store a fresh handle in `handle` and mark it live.
    ///
    /// With reuse the first dead entry of the table is taken, otherwise the
    /// table only grows. The unit aborts when the table is full.
    pub fn acquire_handle(
        &mut self,
        pool: &mut MemoryPool,
        config: &LowerConfig,
        handle: &Variable,
        list: &mut ActionList,
    ) -> Result<(), LowerError> {
        let table = self.handle_table(pool)?.get(None);

        if config.reuse_handles {
            list.extend(handle.set(
                "new handle",
                table.clone().index_of(Element::number(0.0)),
                &[],
            )?);
            let fallback = handle.set("new handle", table.clone().count_of(), &[])?;
            list.push(Action::SkipIf {
                condition: Element::compare(handle.get(), CompareOp::NotEqual, Element::number(-1.0)),
                count: Some(fallback.len() as i32),
            });
            list.extend(fallback);
        } else {
            list.extend(handle.set("new handle", table.count_of(), &[])?);
        }

        list.push(Action::SkipIf {
            condition: Element::compare(
                handle.get(),
                CompareOp::Less,
                Element::number(config.class_capacity),
            ),
            count: Some(1),
        });
        list.push(Action::Abort);

        let table = self.handle_table(pool)?;
        list.extend(table.set(Element::number(1.0), None, &[handle.get()]));
        Ok(())
    }

    /// Clear every field of `class` at `handle`, base first, then mark the
    /// handle dead.
    pub fn release(
        &mut self,
        pool: &mut MemoryPool,
        classes: &ClassTable,
        class: &str,
        handle: Element,
        list: &mut ActionList,
    ) -> Result<(), LowerError> {
        let layout = classes.layout(class)?;
        self.prepare(pool, layout)?;
        for field in classes.all_fields(class)? {
            let stack = self.field_stack(pool, field.stack)?;
            list.extend(stack.set(Element::neutral(), None, &[handle.clone()]));
        }
        let table = self.handle_table(pool)?;
        list.extend(table.set(Element::number(0.0), None, &[handle]));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::FieldDecl;
    use crate::lower::error::ErrorKind;

    fn classes() -> Vec<ClassDecl> {
        vec![
            ClassDecl::new("Derived")
                .extends("Base")
                .field(FieldDecl::new("c", None)),
            ClassDecl::new("Base")
                .field(FieldDecl::new("a", None))
                .field(FieldDecl::new_static("count", None))
                .field(FieldDecl::new("b", None)),
            ClassDecl::new("Sibling")
                .extends("Base")
                .field(FieldDecl::new("d", None)),
        ]
    }

    #[test]
    fn test_base_fields_come_first() {
        let table = ClassTable::build(&classes()).unwrap();

        let base = table.layout("Base").unwrap();
        assert_eq!(base.stack_start, 0);
        assert_eq!(base.stack_end(), 2);

        let derived = table.layout("Derived").unwrap();
        assert_eq!(derived.chain, vec!["Base", "Derived"]);
        assert_eq!(derived.stack_start, 2);
        assert_eq!(table.find_field("Derived", "a").unwrap().stack, 0);
        assert_eq!(table.find_field("Derived", "b").unwrap().stack, 1);
        assert_eq!(table.find_field("Derived", "c").unwrap().stack, 2);
        assert_eq!(table.find_field("Sibling", "d").unwrap().stack, 2);
    }

    #[test]
    fn test_field_lookup_walks_to_declaring_class() {
        let table = ClassTable::build(&classes()).unwrap();
        assert_eq!(table.find_field("Derived", "a").unwrap().owner, "Base");
        assert!(table.find_field("Base", "c").is_err());
        assert_eq!(table.find_static("Derived", "count").unwrap().0, "Base");
    }

    #[test]
    fn test_inheritance_cycle() {
        let decls = vec![
            ClassDecl::new("A").extends("B"),
            ClassDecl::new("B").extends("A"),
        ];
        let err = ClassTable::build(&decls).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedConstruct);
    }

    #[test]
    fn test_unknown_base() {
        let decls = vec![ClassDecl::new("A").extends("Missing")];
        assert!(ClassTable::build(&decls).is_err());
    }

    #[test]
    fn test_default_constructor() {
        let table = ClassTable::build(&classes()).unwrap();
        assert_eq!(table.constructor("Base", 0).unwrap(), ConstructorDecl::default());
        assert!(table.constructor("Base", 1).is_err());
    }

    #[test]
    fn test_field_stacks_created_in_order() {
        let mut pool = MemoryPool::new(PoolKind::Global, 16, false);
        let mut data = ClassData::new();
        assert!(data.field_stack(&mut pool, 1).is_err());

        let table = ClassTable::build(&classes()).unwrap();
        data.prepare(&mut pool, table.layout("Derived").unwrap()).unwrap();
        assert_eq!(data.stack_count(), 3);
        let again = data.field_stack(&mut pool, 0).unwrap();
        assert_eq!(again.slot(), 0);
        assert_eq!(pool.live_count(), 3);
    }
}
