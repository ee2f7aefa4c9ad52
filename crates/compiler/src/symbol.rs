//! Symbol environment for IR generation.
//!
//! Lexically scoped symbol tables plus the name manager that mints every
//! name appearing in the emitted Koopa IR. Variable names (`@x_0`) and
//! label names (`%then_0`) draw suffixes from one shared counter domain,
//! so a user variable called `then` can never collide with an `if` label.
//! Temporaries (`%0`, `%1`, ...) use their own counter, reset per function.

use std::collections::HashMap;

/// Mints unique Koopa IR names.
pub struct NameManager {
    temp: u32,
    counts: HashMap<String, u32>,
}

impl NameManager {
    pub fn new() -> Self {
        NameManager {
            temp: 0,
            counts: HashMap::new(),
        }
    }

    /// Reset the temporary counter. Called at every function entry; the
    /// per-identifier counters deliberately survive for the whole run.
    pub fn reset_temps(&mut self) {
        self.temp = 0;
    }

    /// Next temporary, `%0`, `%1`, ...
    pub fn fresh_temp(&mut self) -> String {
        let name = format!("%{}", self.temp);
        self.temp += 1;
        name
    }

    /// Named variable, `@x_0` for the first `x`, `@x_1` for the second.
    pub fn var_name(&mut self, ident: &str) -> String {
        format!("@{}_{}", ident, self.bump(ident))
    }

    /// Block label, `%while_entry_0` and so on. Shares the counter domain
    /// with [`NameManager::var_name`].
    pub fn label_name(&mut self, tag: &str) -> String {
        format!("%{}_{}", tag, self.bump(tag))
    }

    fn bump(&mut self, key: &str) -> u32 {
        let n = self.counts.entry(key.to_string()).or_insert(0);
        let k = *n;
        *n += 1;
        k
    }
}

impl Default for NameManager {
    fn default() -> Self {
        Self::new()
    }
}

/// The type a SysY identifier is bound to.
///
/// Array dimensions with a leading `-1` mark an array parameter: the
/// binding holds a pointer to the element array rather than the array
/// itself, and the outermost index must go through `getptr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolType {
    Int,
    IntConst(i32),
    FuncInt,
    FuncVoid,
    Array { dims: Vec<i32>, is_const: bool },
}

/// A resolved binding: the name emitted into the IR plus its type.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: SymbolType,
}

/// Stack of single-scope tables with top-down lookup.
pub struct SymbolStack {
    scopes: Vec<HashMap<String, Symbol>>,
    names: NameManager,
}

impl SymbolStack {
    pub fn new() -> Self {
        SymbolStack {
            scopes: Vec::new(),
            names: NameManager::new(),
        }
    }

    pub fn open_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn close_scope(&mut self) {
        self.scopes.pop();
    }

    /// Bind a runtime integer variable; returns its minted `@ident_k` name.
    pub fn declare_int(&mut self, ident: &str) -> String {
        let name = self.names.var_name(ident);
        self.bind(ident, name.clone(), SymbolType::Int);
        name
    }

    /// Bind a compile-time constant. No storage and no IR name of its own;
    /// uses of the identifier fold to the value.
    pub fn declare_int_const(&mut self, ident: &str, value: i32) {
        self.bind(ident, String::new(), SymbolType::IntConst(value));
    }

    /// Bind a function. Functions live in the top scope and keep their
    /// source name (`@main`, `@getint`) so library calls link unchanged.
    pub fn declare_func(&mut self, ident: &str, returns_int: bool) {
        let ty = if returns_int {
            SymbolType::FuncInt
        } else {
            SymbolType::FuncVoid
        };
        self.bind(ident, format!("@{}", ident), ty);
    }

    /// Bind an array; returns its minted name. `dims` may begin with `-1`
    /// for array parameters.
    pub fn declare_array(&mut self, ident: &str, dims: Vec<i32>, is_const: bool) -> String {
        let name = self.names.var_name(ident);
        self.bind(ident, name.clone(), SymbolType::Array { dims, is_const });
        name
    }

    /// Walk scopes from innermost to outermost.
    pub fn lookup(&self, ident: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|s| s.get(ident))
    }

    pub fn fresh_temp(&mut self) -> String {
        self.names.fresh_temp()
    }

    pub fn fresh_label(&mut self, tag: &str) -> String {
        self.names.label_name(tag)
    }

    /// Mint a `@tag_k` name without binding a symbol. Used for compiler
    /// helper slots such as the short-circuit staging variable.
    pub fn fresh_var(&mut self, tag: &str) -> String {
        self.names.var_name(tag)
    }

    pub fn reset_temps(&mut self) {
        self.names.reset_temps();
    }

    fn bind(&mut self, ident: &str, name: String, ty: SymbolType) {
        let scope = self
            .scopes
            .last_mut()
            .expect("symbol declared with no open scope");
        scope.insert(ident.to_string(), Symbol { name, ty });
    }
}

impl Default for SymbolStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_names_count_per_identifier() {
        let mut nm = NameManager::new();
        assert_eq!(nm.var_name("x"), "@x_0");
        assert_eq!(nm.var_name("y"), "@y_0");
        assert_eq!(nm.var_name("x"), "@x_1");
        assert_eq!(nm.var_name("x"), "@x_2");
    }

    #[test]
    fn test_labels_share_counter_domain_with_vars() {
        let mut nm = NameManager::new();
        assert_eq!(nm.var_name("then"), "@then_0");
        // A label with the same tag continues the same counter.
        assert_eq!(nm.label_name("then"), "%then_1");
        assert_eq!(nm.label_name("then"), "%then_2");
    }

    #[test]
    fn test_temps_reset_but_var_counters_survive() {
        let mut nm = NameManager::new();
        assert_eq!(nm.fresh_temp(), "%0");
        assert_eq!(nm.fresh_temp(), "%1");
        assert_eq!(nm.var_name("x"), "@x_0");
        nm.reset_temps();
        assert_eq!(nm.fresh_temp(), "%0");
        assert_eq!(nm.var_name("x"), "@x_1");
    }

    #[test]
    fn test_lookup_walks_scopes_top_down() {
        let mut st = SymbolStack::new();
        st.open_scope();
        st.declare_int("x");
        st.open_scope();
        st.declare_int_const("x", 7);

        match st.lookup("x") {
            Some(Symbol {
                ty: SymbolType::IntConst(7),
                ..
            }) => {}
            other => panic!("expected inner const binding, got {:?}", other.map(|s| &s.ty)),
        }

        st.close_scope();
        match st.lookup("x") {
            Some(Symbol {
                ty: SymbolType::Int,
                name,
            }) => assert_eq!(name, "@x_0"),
            other => panic!("expected outer int binding, got {:?}", other.map(|s| &s.ty)),
        }
    }

    #[test]
    fn test_functions_keep_source_name() {
        let mut st = SymbolStack::new();
        st.open_scope();
        st.declare_func("getint", true);
        assert_eq!(st.lookup("getint").unwrap().name, "@getint");
    }

    #[test]
    fn test_array_param_dims() {
        let mut st = SymbolStack::new();
        st.open_scope();
        st.declare_array("a", vec![-1, 3, 2], false);
        match &st.lookup("a").unwrap().ty {
            SymbolType::Array { dims, is_const } => {
                assert_eq!(dims, &vec![-1, 3, 2]);
                assert!(!is_const);
            }
            other => panic!("expected array type, got {:?}", other),
        }
    }
}
