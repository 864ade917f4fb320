use std::{io::BufRead, path::{Path, PathBuf}};

use anyhow::bail;
use itertools::Itertools;
use serde::{de::{Error, Visitor}, Deserialize};

use crate::error::ErrorKind;

/// Expected outcome of one input line: the printed output (`None` when the
/// REPL prints nothing) or the kind of error it raises.
#[derive(Debug, Clone)]
pub struct TestEvaluationResult(Result<Option<String>, ErrorKind>);

impl From<TestEvaluationResult> for Result<Option<String>, ErrorKind> {
    fn from(value: TestEvaluationResult) -> Self {
        value.0
    }
}

struct EvaluationResultVisitor {}

impl<'de> Deserialize<'de> for TestEvaluationResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de> {

        deserializer.deserialize_map(EvaluationResultVisitor {})
    }
}

impl<'de> Visitor<'de> for EvaluationResultVisitor {
    type Value = TestEvaluationResult;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "A structure containing the boolean key 'ok'. If it's okay, contains the key 'output', otherwise the key 'type'")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::MapAccess<'de>, {

        if map.next_key::<String>()? != Some("ok".to_owned()) {
            return Err(A::Error::custom("First key should be 'ok'"))
        }

        let ok: bool = map.next_value()?;
        let second_key = map.next_key::<String>()?
            .ok_or(A::Error::custom("Must have two keys"))?;

        let result = match (ok, second_key.as_str()) {
            (true, "output") => TestEvaluationResult(Ok(map.next_value::<Option<String>>()?)),
            (false, "type") => TestEvaluationResult(Err(map.next_value::<ErrorKind>()?)),
            (true, other) => return Err(A::Error::custom(format!("Second key should be 'output', got '{}'", other))),
            (false, other) => return Err(A::Error::custom(format!("Second key should be 'type', got '{}'", other))),
        };

        if map.next_key::<String>()?.is_some() {
            return Err(A::Error::custom("Only two keys should be present"));
        }

        Ok(result)
    }
}

const TESTCASES: usize = 8;

fn load_input_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<String>> {
    let source = std::fs::read(path)?;
    Ok(source.lines().collect::<Result<Vec<String>, _>>()?)
}

fn load_output_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<TestEvaluationResult>> {
    let source = std::fs::read(path)?;
    let result: Vec<TestEvaluationResult> = serde_json::from_slice(&source)?;
    Ok(result)
}

/// Pairs every line of `test_inputs/<n>.scm` with its expectation from
/// `test_outputs/<n>.json`. Each input line holds one top-level form.
pub fn load_test_pair(testcase: usize) -> anyhow::Result<Vec<(String, TestEvaluationResult)>> {
    if testcase < 1 || testcase > TESTCASES { bail!("Testcase out of bounds"); }

    let base_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let input = load_input_file(base_path.join("test_inputs").join(format!("{}.scm", testcase)))?;
    let output = load_output_file(base_path.join("test_outputs").join(format!("{}.json", testcase)))?;

    if input.len() != output.len() { bail!("Input and output of testcase {} do not match", testcase); }
    Ok(input.into_iter().zip(output).collect_vec())
}

pub fn all_testcases() -> impl Iterator<Item = usize> {
    1..=TESTCASES
}
