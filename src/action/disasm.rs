use std::collections::BTreeSet;
use std::fmt;

use super::check::skip_target;
use super::element::{ArithOp, Element, Store};
use super::ir::{ActionList, CompiledProgram};
use super::op::Action;

/// Listing of every unit of a compiled program.
pub struct ProgramListing<'a>(pub &'a CompiledProgram);

impl fmt::Display for ProgramListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, actions) in &self.0.units {
            writeln!(f, "════════════════════════════════════════")?;
            writeln!(f, " {}", name)?;
            writeln!(
                f,
                " {} actions, {} elements",
                actions.len(),
                actions.element_count()
            )?;
            writeln!(f, "════════════════════════════════════════")?;
            writeln!(f, "{}", Listing(actions))?;
        }
        Ok(())
    }
}

/// Human-readable listing of one unit. Positions that a skip lands on are
/// marked with `►`.
pub struct Listing<'a>(pub &'a ActionList);

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions = self.0;
        let targets = collect_skip_targets(actions);

        for (ip, action) in actions.iter().enumerate() {
            if targets.contains(&ip) {
                writeln!(f, "      ┌──────────────────────────────────")?;
            }
            let marker = if targets.contains(&ip) { "► " } else { "  " };
            writeln!(f, "{:04} {}{}", ip, marker, format_action(action, ip, actions.len()))?;
        }

        if targets.contains(&actions.len()) {
            writeln!(f, "      ┌──────────────────────────────────")?;
            writeln!(f, "{:04} ► END", actions.len())?;
        }
        Ok(())
    }
}

pub fn disassemble_program(program: &CompiledProgram) -> String {
    ProgramListing(program).to_string()
}

pub fn disassemble(actions: &ActionList) -> String {
    Listing(actions).to_string()
}

fn collect_skip_targets(actions: &ActionList) -> BTreeSet<usize> {
    actions
        .iter()
        .enumerate()
        .filter_map(|(ip, action)| match action.skip_count() {
            Some(Some(count)) => skip_target(ip, count, actions.len()),
            _ => None,
        })
        .collect()
}

fn format_skip(count: Option<i32>, ip: usize, len: usize) -> String {
    match count {
        None => "?".to_string(),
        Some(count) => {
            let direction = if count < 0 { "↑" } else { "↓" };
            match skip_target(ip, count, len) {
                Some(target) => format!("{:+} {} (→ {:04})", count, direction, target),
                None => format!("{:+} {} (→ out of range)", count, direction),
            }
        }
    }
}

pub fn format_action(action: &Action, ip: usize, len: usize) -> String {
    match action {
        Action::SetVariable {
            store,
            slot,
            index,
            value,
        } => {
            let target = format_slot(store, *slot);
            match index {
                Some(index) => format!(
                    "SET         {}[{}] = {}",
                    target,
                    format_element(index),
                    format_element(value)
                ),
                None => format!("SET         {} = {}", target, format_element(value)),
            }
        }
        Action::SkipIf { condition, count } => format!(
            "SKIP_IF     {} ; {}",
            format_skip(*count, ip, len),
            format_element(condition)
        ),
        Action::Skip { count } => format!("SKIP        {}", format_skip(*count, ip, len)),
        Action::Abort => "ABORT".to_string(),
    }
}

fn format_slot(store: &Store, slot: u32) -> String {
    match store {
        Store::Global => format!("g{}", slot),
        Store::Actor(actor) => match actor.as_ref() {
            Element::EventPlayer => format!("a{}", slot),
            other => format!("{}.a{}", format_element(other), slot),
        },
    }
}

pub fn format_element(element: &Element) -> String {
    match element {
        Element::Number(n) => format!("{}", n),
        Element::Bool(b) => format!("{}", b),
        Element::Array(items) => {
            let inner: Vec<String> = items.iter().map(format_element).collect();
            format!("[{}]", inner.join(", "))
        }
        Element::Variable { store, slot } => format_slot(store, *slot),
        Element::ValueInArray { array, index } => {
            format!("{}[{}]", format_element(array), format_element(index))
        }
        Element::CountOf(inner) => format!("count({})", format_element(inner)),
        Element::LastOf(inner) => format!("last({})", format_element(inner)),
        Element::Append { array, value } => {
            format!("append({}, {})", format_element(array), format_element(value))
        }
        Element::ArraySlice {
            array,
            start,
            count,
        } => format!(
            "slice({}, {}, {})",
            format_element(array),
            format_element(start),
            format_element(count)
        ),
        Element::IndexOfArrayValue { array, value } => {
            format!("index_of({}, {})", format_element(array), format_element(value))
        }
        Element::Arithmetic { op, lhs, rhs } => {
            let symbol = match op {
                ArithOp::Add => "+",
                ArithOp::Subtract => "-",
                ArithOp::Multiply => "*",
                ArithOp::Divide => "/",
                ArithOp::Modulo => "%",
            };
            format!("({} {} {})", format_element(lhs), symbol, format_element(rhs))
        }
        Element::Compare { lhs, op, rhs } => format!(
            "({} {} {})",
            format_element(lhs),
            op.symbol(),
            format_element(rhs)
        ),
        Element::And(lhs, rhs) => format!("({} && {})", format_element(lhs), format_element(rhs)),
        Element::Or(lhs, rhs) => format!("({} || {})", format_element(lhs), format_element(rhs)),
        Element::Not(inner) => format!("!{}", format_element(inner)),
        Element::EventPlayer => "event_player".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::element::CompareOp;

    #[test]
    fn test_listing_marks_skip_target() {
        let mut list = ActionList::new();
        let skip = list.push_skip(Some(Element::compare(
            Element::Variable {
                store: Store::Global,
                slot: 0,
            },
            CompareOp::Less,
            Element::number(3.0),
        )));
        list.push(Action::set(Store::Global, 1, Element::number(2.0)));
        list.resolve_here(skip).unwrap();
        list.push(Action::Abort);

        let text = disassemble(&list);
        assert!(text.contains("SKIP_IF     +1 ↓ (→ 0002) ; (g0 < 3)"));
        assert!(text.contains("0002 ► ABORT"));
        assert!(text.contains("SET         g1 = 2"));
    }

    #[test]
    fn test_actor_slot_and_pending_skip() {
        let mut list = ActionList::new();
        list.push(Action::set_at(
            Store::Actor(Box::new(Element::EventPlayer)),
            4,
            Element::number(1.0),
            Element::Bool(true),
        ));
        list.push_skip(None);
        let text = disassemble(&list);
        assert!(text.contains("SET         a4[1] = true"));
        assert!(text.contains("SKIP        ?"));
    }

    #[test]
    fn test_program_listing_heads_each_unit() {
        let mut list = ActionList::new();
        let skip = list.push_skip(None);
        list.resolve_here(skip).unwrap();
        let mut program = CompiledProgram::new();
        program.units.insert("tick".to_string(), list);

        let text = disassemble_program(&program);
        assert!(text.contains(" tick\n 1 actions, 2 elements"));
        assert!(text.contains("0001 ► END"));
        assert_eq!(text, ProgramListing(&program).to_string());
    }
}
