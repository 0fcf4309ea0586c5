// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Row/column scanning over an on-screen keyboard.
//!
//! This example shows how to combine:
//! - a pattern tree loaded from a JSON [`NodeRecord`],
//! - scanning policies loaded from TOML,
//! - [`CueMarkers`] as the highlight registry, and a closure as the rule engine,
//! - dwell tickets, including one that goes stale when the pattern is edited.
//!
//! Run:
//! - `cargo run -p understory_demos --example keyboard_scan`
//! - `RUST_LOG=understory_scan=trace cargo run -p understory_demos --example keyboard_scan`

use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;

use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use understory_scan::{
    AccessRecord, CueMarkers, DEFAULT_CYCLES, NodeRecord, Pattern, ScanConfig, ScanInput, Scanner,
    Selectable, Value, keys,
};

const CONFIG: &str = r#"
[scan]
singleton_groups = "flatten"
preserve_position = true

[demo]
# One switch event per dwell tick: "n" advances, "a" activates.
script = "n a n n a n a n n n a a"
"#;

const PATTERN: &str = r##"{
  "className": "PatternManager",
  "props": { "Key": "rows", "Name": "row, then key", "Cycles": "2", "Cue": "button" },
  "children": [
    {
      "className": "PatternSelector",
      "children": [
        { "className": "Filter", "props": { "Filter": "letter" } },
        { "className": "GroupBy", "props": { "GroupBy": "#row", "Name": "row", "Cycles": "1" } }
      ]
    },
    {
      "className": "PatternGroup",
      "props": { "Name": "controls", "Cue": "group" },
      "children": [
        {
          "className": "PatternSelector",
          "children": [
            { "className": "Filter", "props": { "Filter": "control" } },
            { "className": "OrderBy", "props": { "OrderBy": "#label" } }
          ]
        }
      ]
    }
  ]
}"##;

#[derive(Debug, Deserialize)]
struct DemoConfig {
    #[serde(default)]
    scan: ScanConfig,
    demo: Script,
}

#[derive(Debug, Deserialize)]
struct Script {
    script: String,
}

/// The elements of the keyboard; the scanner only ever sees their indices.
#[derive(Debug)]
struct Keyboard {
    labels: Vec<&'static str>,
    text: Rc<RefCell<String>>,
}

impl Keyboard {
    fn new() -> Self {
        Self {
            labels: vec![
                "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "space", "clear",
            ],
            text: Rc::default(),
        }
    }

    fn selectables(&self) -> Vec<Selectable<usize>> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let access = AccessRecord::new().with(keys::LABEL, *label);
                let access = if label.len() == 1 {
                    access
                        .with("letter", true)
                        .with(keys::ROW, i64::try_from(i / 4).unwrap_or_default())
                        .with(keys::COMPONENT_NAME, "Key")
                } else if *label == "clear" {
                    let text = Rc::clone(&self.text);
                    access
                        .with("control", true)
                        .with_action(move || text.borrow_mut().clear())
                } else {
                    access
                        .with("control", true)
                        .with(keys::COMPONENT_NAME, "Key")
                };
                Selectable::new(i, access)
            })
            .collect()
    }
}

/// Filter expressions here are plain field names tested for truthiness.
fn evaluate(expression: &str, access: &AccessRecord) -> bool {
    access.get(expression).is_some_and(Value::is_truthy)
}

fn lit(scanner: &Scanner<usize, CueMarkers<usize>>, keyboard: &Keyboard) -> String {
    let mut lit: Vec<_> = scanner.highlighter().iter().collect();
    lit.sort_by_key(|(k, _)| *k);
    lit.iter()
        .map(|(k, cue)| format!("{}({cue})", keyboard.labels[*k]))
        .collect::<Vec<_>>()
        .join(" ")
}

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config: DemoConfig = toml::from_str(CONFIG)?;
    let record: NodeRecord = serde_json::from_str(PATTERN)?;
    let pattern = Pattern::from_record(&record)?;
    info!(pattern = %pattern.props.name, scan = ?config.scan, "loaded");

    let keyboard = Keyboard::new();
    let source = || keyboard.selectables();
    let text = Rc::clone(&keyboard.text);
    let mut rules = move |component: &str, event: &str, access: &AccessRecord| {
        let label = access.get(keys::LABEL).and_then(Value::as_str).unwrap_or("?");
        info!(component, event, label, "rule fired");
        let mut text = text.borrow_mut();
        match label {
            "space" => text.push(' '),
            _ => text.push_str(label),
        }
    };

    let mut scanner = Scanner::new(pattern, CueMarkers::new(), config.scan);
    scanner.refresh(&source, &evaluate);

    for (tick, step) in config.demo.script.split_whitespace().enumerate() {
        let input = if step == "a" {
            ScanInput::Activate
        } else {
            ScanInput::Next
        };
        // The host's dwell timer was armed with the ticket of the last cue.
        let ticket = scanner.ticket();
        scanner.dispatch_if_current(ticket, input, &mut rules);
        println!(
            "{tick:>2} {step}  depth {}  lit: {}",
            scanner.frames().len(),
            lit(&scanner, &keyboard)
        );
    }
    println!("typed: {:?}", keyboard.text.borrow());

    // Editing the pattern while a timer is pending restarts the scan and
    // orphans that timer's ticket.
    let pending = scanner.ticket();
    let mut edited = scanner.pattern().clone();
    edited.props.cycles = DEFAULT_CYCLES.saturating_add(1);
    scanner.set_pattern(edited);
    let outcome = scanner.refresh(&source, &evaluate);
    let fired = scanner.dispatch_if_current(pending, ScanInput::Next, &mut rules);
    println!("after edit: {outcome:?}, stale timer handled: {}", fired.is_some());

    Ok(())
}
