//! Rule compiler - transforms declarations into executable rules.
//!
//! Compiles `RuleDecl` from the language crate into `CompiledRule` and a
//! whole `RulesFile` into a `RuleSet`.

use hotswap_foundation::Result;
use hotswap_language::declaration::{ActionDecl, RuleDecl, RulesFile};
use hotswap_language::parse_rules;

use crate::pattern::PatternCompiler;
use crate::rule::{Action, CompiledRule, RuleSet};

/// Compiles rule declarations into executable rules.
pub struct RuleCompiler;

impl RuleCompiler {
    /// Compile a rule declaration.
    ///
    /// # Errors
    /// Returns an error if pattern compilation fails.
    pub fn compile(decl: &RuleDecl) -> Result<CompiledRule> {
        let pattern = PatternCompiler::compile(&decl.name, &decl.clauses, &decl.guards)?;

        let actions = decl
            .actions
            .iter()
            .map(|a| match a {
                ActionDecl::Emit(tag) => Action::Emit(tag.clone()),
                ActionDecl::Log(message) => Action::Log(message.clone()),
            })
            .collect();

        Ok(CompiledRule {
            name: decl.name.clone(),
            salience: decl.salience,
            enabled: decl.enabled,
            pattern,
            actions,
        })
    }

    /// Compile every rule of a file into a rule set carrying the file's
    /// version and package.
    ///
    /// # Errors
    /// Returns `DuplicateRuleName` if two rules share a name, or any
    /// compilation error.
    pub fn compile_file(file: &RulesFile) -> Result<RuleSet> {
        let rules = file
            .rules
            .iter()
            .map(Self::compile)
            .collect::<Result<Vec<_>>>()?;

        let mut set = RuleSet::new(rules)?.with_version(file.version());
        if let Some(package) = file.package() {
            set = set.with_package(package);
        }
        Ok(set)
    }

    /// Parse and compile rule source text.
    ///
    /// # Errors
    /// Returns a `ParseError`, `InvalidRule` or `DuplicateRuleName`.
    pub fn compile_source(source: &str) -> Result<RuleSet> {
        Self::compile_file(&parse_rules(source)?)
    }
}
