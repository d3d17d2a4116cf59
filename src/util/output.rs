#![allow(clippy::print_stdout)]

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::sync::{LazyLock, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

static JSON_OUTPUT: LazyLock<Mutex<Map<String, Value>>> =
    LazyLock::new(|| Mutex::new(Map::new()));
static SHOULD_PRINT_OUTPUT: AtomicBool = AtomicBool::new(true);

/// Human readable output is suppressed when the run reports as JSON.
pub fn set_should_print_output(should_print: bool) {
    SHOULD_PRINT_OUTPUT.store(should_print, Ordering::Relaxed);
}

pub fn print_output(printed_output: &str) {
    if SHOULD_PRINT_OUTPUT.load(Ordering::Relaxed) {
        println!("{}", printed_output);
    }
}

pub fn set_json_output(key: &str, value: &Value) {
    if let Ok(mut json_output) = JSON_OUTPUT.lock() {
        json_output.insert(key.to_string(), value.clone());
    }
}

#[macro_export]
macro_rules! outln {
    ( $fmt:expr $(, $args:expr)*) => {
        $crate::util::print_output(&format!($fmt $(, $args)*))
    };
}

pub fn render_json_output() -> Result<String> {
    let json_output = match JSON_OUTPUT.lock() {
        Ok(json_output) => json_output.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    serde_json::to_string_pretty(&Value::Object(json_output))
        .context("Error serializing JSON")
}

pub fn print_json_output() -> Result<()> {
    println!("{}", render_json_output()?);
    Ok(())
}
