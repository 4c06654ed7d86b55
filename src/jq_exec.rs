use anyhow::{anyhow, Result};
use jaq_core::{load, Compiler, Ctx, RcIter};
use jaq_json::Val;
use serde_json::Value;

/// Runs a jq filter over one document and returns every output it yields.
pub fn run_jaq(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader.load(&arena, program).map_err(|errs| {
        let problems = errs.into_iter().map(|(_, err)| format!("{err:?}")).collect();
        rejected(filter_src, "syntax error", problems)
    })?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(|errs| {
            let problems = errs
                .into_iter()
                .flat_map(|(_, names)| names)
                .map(|(name, undefined)| format!("`{name}` is not defined ({undefined:?})"))
                .collect();
            rejected(filter_src, "undefined name", problems)
        })?;

    let inputs = RcIter::new(core::iter::empty());
    let outputs = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut out = Vec::new();
    for item in outputs {
        let val = item.map_err(|e| anyhow!("jq `{filter_src}` failed: {e:?}"))?;
        out.push(Value::from(val));
    }
    tracing::debug!(filter = filter_src, outputs = out.len(), "applied jq filter");
    Ok(out)
}

/// One error for a filter that never ran, listing every problem found.
fn rejected(filter_src: &str, what: &str, problems: Vec<String>) -> anyhow::Error {
    let plural = if problems.len() == 1 { "" } else { "s" };
    anyhow!("jq `{filter_src}` rejected, {} {what}{plural}: {}", problems.len(), problems.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn selects_and_splits() {
        let doc = json!({"items": [{"id": 1}, {"id": 2}]});
        let out = run_jaq(".items[]", &doc).unwrap();
        assert_eq!(out, vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[test]
    fn bad_filter_is_an_error() {
        let syntax = run_jaq(".items[", &json!({})).unwrap_err().to_string();
        assert!(syntax.contains("syntax error"), "{syntax}");

        let undefined = run_jaq("nosuchfn(1)", &json!({})).unwrap_err().to_string();
        assert!(undefined.contains("undefined name"), "{undefined}");
        assert!(undefined.contains("`nosuchfn` is not defined"), "{undefined}");
    }
}
