//! Hand-written parser for SysY.
//!
//! Tokenizes the source into plain text tokens with positions, then runs
//! recursive descent over the token vector. The grammar is the usual
//! C-like ladder; precedence lives entirely in the parse functions.
//!
//! The parser builds the AST and nothing else. Name resolution, constant
//! evaluation and type-shaped checks all happen during lowering.

use crate::ast::{
    BinaryOp, Block, BlockItem, CompUnit, ConstDecl, ConstDef, Decl, Exp, FuncDef, FuncParam,
    FuncType, InitVal, LVal, Stmt, UnaryOp, VarDecl, VarDef,
};

/// A token with its source position (0-indexed line and column).
#[derive(Debug, Clone)]
pub struct Token {
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    fn new(text: String, line: usize, column: usize) -> Self {
        Token { text, line, column }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Parser {
            tokens: tokenize(source),
            pos: 0,
        }
    }

    pub fn parse(&mut self) -> Result<CompUnit, String> {
        let mut unit = CompUnit {
            decls: Vec::new(),
            funcs: Vec::new(),
        };

        while !self.is_at_end() {
            if self.check("const") {
                unit.decls.push(self.parse_decl()?);
                continue;
            }
            // `int`/`void` ident `(` opens a function definition; anything
            // else at top level is a variable declaration.
            if self.peek_text(2) == Some("(") {
                unit.funcs.push(self.parse_func_def()?);
            } else {
                unit.decls.push(self.parse_decl()?);
            }
        }

        Ok(unit)
    }

    // ----- declarations -----

    fn parse_decl(&mut self) -> Result<Decl, String> {
        if self.consume("const") {
            self.expect("int")?;
            let mut defs = vec![self.parse_const_def()?];
            while self.consume(",") {
                defs.push(self.parse_const_def()?);
            }
            self.expect(";")?;
            Ok(Decl::Const(ConstDecl { defs }))
        } else {
            self.expect("int")?;
            let mut defs = vec![self.parse_var_def()?];
            while self.consume(",") {
                defs.push(self.parse_var_def()?);
            }
            self.expect(";")?;
            Ok(Decl::Var(VarDecl { defs }))
        }
    }

    fn parse_const_def(&mut self) -> Result<ConstDef, String> {
        let ident = self.parse_ident("constant name")?;
        let dims = self.parse_array_dims()?;
        self.expect("=")?;
        let init = self.parse_init_val()?;
        Ok(ConstDef { ident, dims, init })
    }

    fn parse_var_def(&mut self) -> Result<VarDef, String> {
        let ident = self.parse_ident("variable name")?;
        let dims = self.parse_array_dims()?;
        let init = if self.consume("=") {
            Some(self.parse_init_val()?)
        } else {
            None
        };
        Ok(VarDef { ident, dims, init })
    }

    fn parse_array_dims(&mut self) -> Result<Vec<Exp>, String> {
        let mut dims = Vec::new();
        while self.consume("[") {
            dims.push(self.parse_exp()?);
            self.expect("]")?;
        }
        Ok(dims)
    }

    fn parse_init_val(&mut self) -> Result<InitVal, String> {
        if self.consume("{") {
            let mut items = Vec::new();
            if !self.check("}") {
                items.push(self.parse_init_val()?);
                while self.consume(",") {
                    items.push(self.parse_init_val()?);
                }
            }
            self.expect("}")?;
            Ok(InitVal::List(items))
        } else {
            Ok(InitVal::Exp(self.parse_exp()?))
        }
    }

    // ----- functions -----

    fn parse_func_def(&mut self) -> Result<FuncDef, String> {
        let ret = if self.consume("void") {
            FuncType::Void
        } else {
            self.expect("int")?;
            FuncType::Int
        };
        let ident = self.parse_ident("function name")?;
        self.expect("(")?;
        let mut params = Vec::new();
        if !self.check(")") {
            params.push(self.parse_func_param()?);
            while self.consume(",") {
                params.push(self.parse_func_param()?);
            }
        }
        self.expect(")")?;
        let body = self.parse_block()?;
        Ok(FuncDef {
            ret,
            ident,
            params,
            body,
        })
    }

    fn parse_func_param(&mut self) -> Result<FuncParam, String> {
        self.expect("int")?;
        let ident = self.parse_ident("parameter name")?;
        let dims = if self.consume("[") {
            // Leading dimension is always empty: `int a[][3]`.
            self.expect("]")?;
            let mut rest = Vec::new();
            while self.consume("[") {
                rest.push(self.parse_exp()?);
                self.expect("]")?;
            }
            Some(rest)
        } else {
            None
        };
        Ok(FuncParam { ident, dims })
    }

    // ----- statements -----

    fn parse_block(&mut self) -> Result<Block, String> {
        self.expect("{")?;
        let mut items = Vec::new();
        while !self.check("}") {
            if self.is_at_end() {
                return Err("unexpected end of input inside block".to_string());
            }
            if self.check("const") || self.check("int") {
                items.push(BlockItem::Decl(self.parse_decl()?));
            } else {
                items.push(BlockItem::Stmt(self.parse_stmt()?));
            }
        }
        self.expect("}")?;
        Ok(Block { items })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, String> {
        if self.consume("return") {
            let exp = if self.check(";") {
                None
            } else {
                Some(self.parse_exp()?)
            };
            self.expect(";")?;
            return Ok(Stmt::Return(exp));
        }
        if self.check("{") {
            return Ok(Stmt::Block(self.parse_block()?));
        }
        if self.consume("if") {
            self.expect("(")?;
            let cond = self.parse_exp()?;
            self.expect(")")?;
            let then_branch = Box::new(self.parse_stmt()?);
            // Dangling else binds to the nearest if.
            let else_branch = if self.consume("else") {
                Some(Box::new(self.parse_stmt()?))
            } else {
                None
            };
            return Ok(Stmt::If {
                cond,
                then_branch,
                else_branch,
            });
        }
        if self.consume("while") {
            self.expect("(")?;
            let cond = self.parse_exp()?;
            self.expect(")")?;
            let body = Box::new(self.parse_stmt()?);
            return Ok(Stmt::While { cond, body });
        }
        if self.consume("break") {
            self.expect(";")?;
            return Ok(Stmt::Break);
        }
        if self.consume("continue") {
            self.expect(";")?;
            return Ok(Stmt::Continue);
        }
        if self.consume(";") {
            return Ok(Stmt::Exp(None));
        }

        // Assignment or expression statement; parse_exp handles both.
        let exp = self.parse_exp()?;
        self.expect(";")?;
        if let Exp::Assign { lval, exp } = exp {
            return Ok(Stmt::Assign { lval, exp: *exp });
        }
        Ok(Stmt::Exp(Some(exp)))
    }

    // ----- expressions (precedence ladder) -----

    /// Assignment sits below the logical ladder and associates to the
    /// right, so `a = b = 1` and `if (1 && (x = 1))` both parse.
    fn parse_exp(&mut self) -> Result<Exp, String> {
        let lhs = self.parse_lor()?;
        if self.consume("=") {
            let lval = match lhs {
                Exp::LVal(lval) => lval,
                _ => return Err(self.err_here("left side of assignment is not assignable")),
            };
            let rhs = self.parse_exp()?;
            return Ok(Exp::Assign {
                lval,
                exp: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    fn parse_lor(&mut self) -> Result<Exp, String> {
        let mut lhs = self.parse_land()?;
        while self.consume("||") {
            let rhs = self.parse_land()?;
            lhs = Exp::binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_land(&mut self) -> Result<Exp, String> {
        let mut lhs = self.parse_eq()?;
        while self.consume("&&") {
            let rhs = self.parse_eq()?;
            lhs = Exp::binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_eq(&mut self) -> Result<Exp, String> {
        let mut lhs = self.parse_rel()?;
        loop {
            let op = if self.consume("==") {
                BinaryOp::Eq
            } else if self.consume("!=") {
                BinaryOp::Ne
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_rel()?;
            lhs = Exp::binary(op, lhs, rhs);
        }
    }

    fn parse_rel(&mut self) -> Result<Exp, String> {
        let mut lhs = self.parse_add()?;
        loop {
            let op = if self.consume("<=") {
                BinaryOp::Le
            } else if self.consume(">=") {
                BinaryOp::Ge
            } else if self.consume("<") {
                BinaryOp::Lt
            } else if self.consume(">") {
                BinaryOp::Gt
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_add()?;
            lhs = Exp::binary(op, lhs, rhs);
        }
    }

    fn parse_add(&mut self) -> Result<Exp, String> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = if self.consume("+") {
                BinaryOp::Add
            } else if self.consume("-") {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_mul()?;
            lhs = Exp::binary(op, lhs, rhs);
        }
    }

    fn parse_mul(&mut self) -> Result<Exp, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.consume("*") {
                BinaryOp::Mul
            } else if self.consume("/") {
                BinaryOp::Div
            } else if self.consume("%") {
                BinaryOp::Mod
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_unary()?;
            lhs = Exp::binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Result<Exp, String> {
        let op = if self.consume("+") {
            UnaryOp::Plus
        } else if self.consume("-") {
            UnaryOp::Neg
        } else if self.consume("!") {
            UnaryOp::Not
        } else {
            return self.parse_primary();
        };
        let exp = self.parse_unary()?;
        Ok(Exp::unary(op, exp))
    }

    fn parse_primary(&mut self) -> Result<Exp, String> {
        if self.consume("(") {
            let exp = self.parse_exp()?;
            self.expect(")")?;
            return Ok(exp);
        }

        let token = self
            .advance()
            .ok_or_else(|| "unexpected end of input in expression".to_string())?
            .clone();

        if let Some(n) = parse_int_literal(&token.text) {
            return Ok(Exp::Number(n));
        }
        if !is_ident(&token.text) {
            return Err(format!(
                "line {}: expected expression, got '{}'",
                token.line + 1,
                token.text
            ));
        }

        if self.consume("(") {
            let mut args = Vec::new();
            if !self.check(")") {
                args.push(self.parse_exp()?);
                while self.consume(",") {
                    args.push(self.parse_exp()?);
                }
            }
            self.expect(")")?;
            return Ok(Exp::Call {
                ident: token.text,
                args,
            });
        }

        let mut indices = Vec::new();
        while self.consume("[") {
            indices.push(self.parse_exp()?);
            self.expect("]")?;
        }
        Ok(Exp::LVal(LVal {
            ident: token.text,
            indices,
        }))
    }

    // ----- cursor helpers -----

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_text(&self, ahead: usize) -> Option<&str> {
        self.tokens.get(self.pos + ahead).map(|t| t.text.as_str())
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, text: &str) -> bool {
        self.peek_text(0) == Some(text)
    }

    fn consume(&mut self, text: &str) -> bool {
        if self.check(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> Result<(), String> {
        if self.consume(text) {
            Ok(())
        } else {
            Err(self.err_here(&format!("expected '{}'", text)))
        }
    }

    fn parse_ident(&mut self, what: &str) -> Result<String, String> {
        match self.advance() {
            Some(t) if is_ident(&t.text) => Ok(t.text.clone()),
            Some(t) => Err(format!(
                "line {}: expected {}, got '{}'",
                t.line + 1,
                what,
                t.text
            )),
            None => Err(format!("unexpected end of input, expected {}", what)),
        }
    }

    fn err_here(&self, message: &str) -> String {
        match self.current() {
            Some(t) => format!(
                "line {}, column {}: {}, got '{}'",
                t.line + 1,
                t.column + 1,
                message,
                t.text
            ),
            None => format!("unexpected end of input: {}", message),
        }
    }
}

/// True if `text` is a SysY identifier (letters, digits, underscore, not
/// starting with a digit, not a keyword).
fn is_ident(text: &str) -> bool {
    const KEYWORDS: [&str; 9] = [
        "int", "void", "const", "if", "else", "while", "break", "continue", "return",
    ];
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    !KEYWORDS.contains(&text)
}

/// Parse a decimal, octal (`0` prefix) or hex (`0x`) literal. Values are
/// wrapped into `i32`, so `2147483648` survives under a unary minus.
fn parse_int_literal(text: &str) -> Option<i32> {
    let first = text.chars().next()?;
    if !first.is_ascii_digit() {
        return None;
    }
    let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if text.len() > 1 && first == '0' {
        i64::from_str_radix(&text[1..], 8).ok()?
    } else {
        text.parse::<i64>().ok()?
    };
    Some(value as i32)
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    let mut line = 0;
    let mut col = 0;

    let two_char_ops = ["==", "!=", "<=", ">=", "&&", "||"];
    let one_char_ops = "+-*/%<>=!()[]{};,";

    while i < chars.len() {
        let c = chars[i];

        if c == '\n' {
            i += 1;
            line += 1;
            col = 0;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            col += 1;
            continue;
        }

        // Line comment.
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        // Block comment.
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            col += 2;
            while i < chars.len() {
                if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                    i += 2;
                    col += 2;
                    break;
                }
                if chars[i] == '\n' {
                    line += 1;
                    col = 0;
                } else {
                    col += 1;
                }
                i += 1;
            }
            continue;
        }

        // Identifier or keyword.
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            let start_col = col;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
                col += 1;
            }
            tokens.push(Token::new(
                chars[start..i].iter().collect(),
                line,
                start_col,
            ));
            continue;
        }

        // Number: decimal, octal or hex; letters are swallowed so that a
        // malformed literal like `0xg` fails in the parser, not here.
        if c.is_ascii_digit() {
            let start = i;
            let start_col = col;
            while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                i += 1;
                col += 1;
            }
            tokens.push(Token::new(
                chars[start..i].iter().collect(),
                line,
                start_col,
            ));
            continue;
        }

        // Two-character operators before their one-character prefixes.
        if i + 1 < chars.len() {
            let pair: String = chars[i..i + 2].iter().collect();
            if two_char_ops.contains(&pair.as_str()) {
                tokens.push(Token::new(pair, line, col));
                i += 2;
                col += 2;
                continue;
            }
        }

        if one_char_ops.contains(c) {
            tokens.push(Token::new(c.to_string(), line, col));
            i += 1;
            col += 1;
            continue;
        }

        // Unknown character: emit it as a token and let the parser report
        // it with a position.
        tokens.push(Token::new(c.to_string(), line, col));
        i += 1;
        col += 1;
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_main() {
        let mut parser = Parser::new("int main() { return 0; }");
        let unit = parser.parse().unwrap();
        assert_eq!(unit.funcs.len(), 1);
        let main = &unit.funcs[0];
        assert_eq!(main.ident, "main");
        assert_eq!(main.ret, FuncType::Int);
        assert_eq!(main.body.items.len(), 1);
    }

    #[test]
    fn test_precedence_mul_binds_tighter() {
        let mut parser = Parser::new("int main() { return 1 + 2 * 3; }");
        let unit = parser.parse().unwrap();
        let ret = match &unit.funcs[0].body.items[0] {
            BlockItem::Stmt(Stmt::Return(Some(e))) => e,
            other => panic!("expected return, got {:?}", other),
        };
        match ret {
            Exp::Binary {
                op: BinaryOp::Add,
                rhs,
                ..
            } => match rhs.as_ref() {
                Exp::Binary {
                    op: BinaryOp::Mul, ..
                } => {}
                other => panic!("expected mul on the right, got {:?}", other),
            },
            other => panic!("expected add at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_dangling_else_binds_to_nearest_if() {
        let src = "int main() { if (1) if (0) return 1; else return 2; return 3; }";
        let unit = Parser::new(src).parse().unwrap();
        match &unit.funcs[0].body.items[0] {
            BlockItem::Stmt(Stmt::If {
                then_branch,
                else_branch: None,
                ..
            }) => match then_branch.as_ref() {
                Stmt::If {
                    else_branch: Some(_),
                    ..
                } => {}
                other => panic!("inner if should own the else, got {:?}", other),
            },
            other => panic!("expected outer if without else, got {:?}", other),
        }
    }

    #[test]
    fn test_array_decl_and_nested_init() {
        let src = "int a[2][3] = {1, 2, 3, {4, 5, 6}};";
        let unit = Parser::new(src).parse().unwrap();
        let def = match &unit.decls[0] {
            Decl::Var(v) => &v.defs[0],
            other => panic!("expected var decl, got {:?}", other),
        };
        assert_eq!(def.ident, "a");
        assert_eq!(def.dims.len(), 2);
        match def.init.as_ref().unwrap() {
            InitVal::List(items) => assert_eq!(items.len(), 4),
            other => panic!("expected init list, got {:?}", other),
        }
    }

    #[test]
    fn test_array_param_with_leading_empty_dim() {
        let src = "int f(int a[][3][2]) { return a[1][2][0]; }";
        let unit = Parser::new(src).parse().unwrap();
        let param = &unit.funcs[0].params[0];
        assert_eq!(param.ident, "a");
        assert_eq!(param.dims.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_number_bases() {
        assert_eq!(parse_int_literal("42"), Some(42));
        assert_eq!(parse_int_literal("0"), Some(0));
        assert_eq!(parse_int_literal("017"), Some(15));
        assert_eq!(parse_int_literal("0x1F"), Some(31));
        assert_eq!(parse_int_literal("0XFF"), Some(255));
        assert_eq!(parse_int_literal("x"), None);
    }

    #[test]
    fn test_comments_are_skipped() {
        let src = "// header\nint main() { /* body\n spans lines */ return 0; }";
        assert!(Parser::new(src).parse().is_ok());
    }

    #[test]
    fn test_assignment_versus_expression_statement() {
        let src = "int main() { int x = 0; x = x + 1; x + 1; return x; }";
        let unit = Parser::new(src).parse().unwrap();
        let items = &unit.funcs[0].body.items;
        assert!(matches!(items[1], BlockItem::Stmt(Stmt::Assign { .. })));
        assert!(matches!(items[2], BlockItem::Stmt(Stmt::Exp(Some(_)))));
    }

    #[test]
    fn test_assignment_to_non_lval_is_rejected() {
        let src = "int main() { 1 = 2; return 0; }";
        assert!(Parser::new(src).parse().is_err());
    }

    #[test]
    fn test_call_with_arguments() {
        let src = "void f(int x, int a[]) {} int main() { f(1 + 2, 3); return 0; }";
        let unit = Parser::new(src).parse().unwrap();
        match &unit.funcs[1].body.items[0] {
            BlockItem::Stmt(Stmt::Exp(Some(Exp::Call { ident, args }))) => {
                assert_eq!(ident, "f");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected call statement, got {:?}", other),
        }
    }
}
