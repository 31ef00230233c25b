use super::token::{Token, TokenKind};
use crate::diagnostic::{Code, DiagnosticSink, Span};
use crate::structures::ast::*;
use vec1::Vec1;

/// Recursive-descent parser over the token stream.
///
/// Parsing never aborts. Missing `;`, `)` and `]` report codes `i`, `j`, `k`
/// at the line of the token *before* the expected position, then continue as
/// if the token had been there. Any other unexpected token is skipped.
pub struct Parser<'d> {
    tokens: Vec<Token>,
    pos: usize,
    sink: &'d mut DiagnosticSink,
}

impl<'d> Parser<'d> {
    pub fn new(tokens: Vec<Token>, sink: &'d mut DiagnosticSink) -> Self {
        assert!(
            matches!(tokens.last(), Some(token) if token.kind == TokenKind::Eof),
            "token stream must end with Eof"
        );
        Self { tokens, pos: 0, sink }
    }

    // ---- cursor --------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn nth_kind(&self, n: usize) -> &TokenKind {
        // Clamping to the trailing Eof keeps lookahead total.
        let at = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[at].kind
    }

    fn at_eof(&self) -> bool {
        *self.kind() == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if !self.at_eof() {
            self.pos += 1;
        }
        token
    }

    fn accept(&mut self, kind: &TokenKind) -> Option<Token> {
        (self.kind() == kind).then(|| self.advance())
    }

    /// The token just consumed; the anchor for `i`/`j`/`k` reports.
    fn prev(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn span_from(&self, start: usize) -> Span {
        let lo = self.tokens[start].span.start();
        let hi = self.prev().span.excl_end().max(lo);
        (lo..hi).into()
    }

    fn expect_semicolon(&mut self) {
        if self.accept(&TokenKind::Semicolon).is_none() {
            let anchor = self.prev().clone();
            self.sink.report(anchor.line, Code::MissingSemicolon, anchor.span);
        }
    }

    fn expect_rparen(&mut self) {
        if self.accept(&TokenKind::RParen).is_none() {
            let anchor = self.prev().clone();
            self.sink.report(anchor.line, Code::MissingRparen, anchor.span);
        }
    }

    fn expect_rbracket(&mut self) {
        if self.accept(&TokenKind::RBracket).is_none() {
            let anchor = self.prev().clone();
            self.sink.report(anchor.line, Code::MissingRbracket, anchor.span);
        }
    }

    fn ident(&mut self) -> Ident {
        match self.kind().clone() {
            TokenKind::Ident(name) => {
                let token = self.advance();
                Ident { name, line: token.line, span: token.span }
            }
            // `main` can appear as a plain callee/name in broken inputs.
            TokenKind::Main => {
                let token = self.advance();
                Ident { name: "main".into(), line: token.line, span: token.span }
            }
            _ => {
                let token = self.peek().clone();
                Ident { name: String::new(), line: token.line, span: token.span }
            }
        }
    }

    // ---- compilation unit ----------------------------------------------

    pub fn comp_unit(mut self) -> CompUnit {
        let mut unit = CompUnit { decls: Vec::new(), funcs: Vec::new(), main: None };
        while !self.at_eof() {
            match self.kind() {
                TokenKind::Const => {
                    let decl = self.const_decl();
                    unit.decls.push(Decl::Const(decl));
                }
                TokenKind::Static => {
                    let decl = self.var_decl();
                    unit.decls.push(Decl::Var(decl));
                }
                TokenKind::Int if *self.nth_kind(1) == TokenKind::Main => {
                    unit.main = Some(self.main_func_def());
                }
                TokenKind::Int | TokenKind::Void
                    if matches!(self.nth_kind(1), TokenKind::Ident(_))
                        && *self.nth_kind(2) == TokenKind::LParen =>
                {
                    unit.funcs.push(self.func_def());
                }
                TokenKind::Int => {
                    let decl = self.var_decl();
                    unit.decls.push(Decl::Var(decl));
                }
                _ => {
                    self.advance();
                }
            }
        }
        unit
    }

    // ---- declarations --------------------------------------------------

    fn const_decl(&mut self) -> ConstDecl {
        self.advance(); // const
        self.accept(&TokenKind::Int);
        let first = self.const_def();
        let mut defs = Vec1::new(first);
        while self.accept(&TokenKind::Comma).is_some() {
            defs.push(self.const_def());
        }
        self.expect_semicolon();
        ConstDecl { defs }
    }

    fn const_def(&mut self) -> ConstDef {
        let ident = self.ident();
        let len = self.array_len();
        self.accept(&TokenKind::Assign);
        let init = self.init_val();
        ConstDef { ident, len, init }
    }

    fn var_decl(&mut self) -> VarDecl {
        let is_static = self.accept(&TokenKind::Static).is_some();
        self.accept(&TokenKind::Int);
        let first = self.var_def();
        let mut defs = Vec1::new(first);
        while self.accept(&TokenKind::Comma).is_some() {
            defs.push(self.var_def());
        }
        self.expect_semicolon();
        VarDecl { is_static, defs }
    }

    fn var_def(&mut self) -> VarDef {
        let ident = self.ident();
        let len = self.array_len();
        let init = self
            .accept(&TokenKind::Assign)
            .map(|_| self.init_val());
        VarDef { ident, len, init }
    }

    fn array_len(&mut self) -> Option<Exp> {
        self.accept(&TokenKind::LBracket).map(|_| {
            let len = self.exp();
            self.expect_rbracket();
            len
        })
    }

    fn init_val(&mut self) -> InitVal {
        if self.accept(&TokenKind::LBrace).is_none() {
            return InitVal::Scalar(self.exp());
        }
        let mut elems = Vec::new();
        if *self.kind() != TokenKind::RBrace {
            elems.push(self.exp());
            while self.accept(&TokenKind::Comma).is_some() {
                elems.push(self.exp());
            }
        }
        self.accept(&TokenKind::RBrace);
        InitVal::List(elems)
    }

    // ---- functions -----------------------------------------------------

    fn func_def(&mut self) -> FuncDef {
        let ret_ty = match self.advance().kind {
            TokenKind::Void => FuncRetTy::Void,
            _ => FuncRetTy::Int,
        };
        let ident = self.ident();
        self.accept(&TokenKind::LParen);
        let params = if *self.kind() == TokenKind::RParen || *self.kind() == TokenKind::LBrace {
            Vec::new()
        } else {
            self.func_params()
        };
        self.expect_rparen();
        let body = self.block();
        FuncDef { ret_ty, ident, params, body }
    }

    fn main_func_def(&mut self) -> FuncDef {
        self.advance(); // int
        let main = self.advance(); // main
        let ident = Ident { name: "main".into(), line: main.line, span: main.span };
        self.accept(&TokenKind::LParen);
        self.expect_rparen();
        let body = self.block();
        FuncDef { ret_ty: FuncRetTy::Int, ident, params: Vec::new(), body }
    }

    fn func_params(&mut self) -> Vec<FuncParam> {
        let mut params = vec![self.func_param()];
        while self.accept(&TokenKind::Comma).is_some() {
            params.push(self.func_param());
        }
        params
    }

    fn func_param(&mut self) -> FuncParam {
        self.accept(&TokenKind::Int);
        let ident = self.ident();
        let is_array = self
            .accept(&TokenKind::LBracket)
            .map(|_| self.expect_rbracket())
            .is_some();
        FuncParam { ident, is_array }
    }

    // ---- statements ----------------------------------------------------

    fn block(&mut self) -> Block {
        self.accept(&TokenKind::LBrace);
        let mut items = Vec::new();
        loop {
            match self.kind() {
                TokenKind::RBrace | TokenKind::Eof => break,
                TokenKind::Const => {
                    let decl = self.const_decl();
                    items.push(BlockItem::Decl(Decl::Const(decl)));
                }
                TokenKind::Static | TokenKind::Int => {
                    let decl = self.var_decl();
                    items.push(BlockItem::Decl(Decl::Var(decl)));
                }
                _ => items.push(BlockItem::Stmt(self.stmt())),
            }
        }
        let end = self.advance(); // `}` (or Eof)
        Block { items, end_line: end.line }
    }

    fn stmt(&mut self) -> Stmt {
        let line = self.peek().line;
        let kind = match self.kind() {
            TokenKind::LBrace => StmtKind::Block(self.block()),
            TokenKind::If => self.if_stmt(),
            TokenKind::For => self.for_stmt(),
            TokenKind::Break => {
                self.advance();
                self.expect_semicolon();
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                self.expect_semicolon();
                StmtKind::Continue
            }
            TokenKind::Return => {
                self.advance();
                let value = (*self.kind() != TokenKind::Semicolon
                    && *self.kind() != TokenKind::RBrace)
                    .then(|| self.exp());
                self.expect_semicolon();
                StmtKind::Return(value)
            }
            TokenKind::Printf => self.printf_stmt(),
            TokenKind::Semicolon => {
                self.advance();
                StmtKind::Exp(None)
            }
            _ => {
                let exp = self.exp();
                let kind = if self.accept(&TokenKind::Assign).is_some() {
                    let value = self.exp();
                    match exp.kind {
                        ExpKind::LVal(target) => {
                            StmtKind::Assign(Assign { target, value, line: exp.line })
                        }
                        // Not an lvalue; keep the right-hand side so later
                        // phases still see its names.
                        _ => StmtKind::Exp(Some(value)),
                    }
                } else {
                    StmtKind::Exp(Some(exp))
                };
                self.expect_semicolon();
                kind
            }
        };
        Stmt { kind, line }
    }

    fn if_stmt(&mut self) -> StmtKind {
        self.advance(); // if
        self.accept(&TokenKind::LParen);
        let cond = self.exp();
        self.expect_rparen();
        let then_branch = Box::new(self.stmt());
        let else_branch = self
            .accept(&TokenKind::Else)
            .map(|_| Box::new(self.stmt()));
        StmtKind::If { cond, then_branch, else_branch }
    }

    fn for_stmt(&mut self) -> StmtKind {
        self.advance(); // for
        self.accept(&TokenKind::LParen);

        let init = match self.kind() {
            TokenKind::Semicolon => {
                self.advance();
                None
            }
            TokenKind::Const => {
                let decl = self.const_decl(); // consumes its `;`
                Some(ForInit::Decl(Decl::Const(decl)))
            }
            TokenKind::Static | TokenKind::Int => {
                let decl = self.var_decl(); // consumes its `;`
                Some(ForInit::Decl(Decl::Var(decl)))
            }
            _ => {
                let assigns = self.assign_list();
                self.expect_semicolon();
                Some(ForInit::Assigns(assigns))
            }
        };

        let cond = match self.kind() {
            TokenKind::Semicolon => None,
            _ => Some(self.exp()),
        };
        self.expect_semicolon();

        let step = match self.kind() {
            TokenKind::RParen => None,
            _ => Some(self.assign_list()),
        };
        self.expect_rparen();

        let body = Box::new(self.stmt());
        StmtKind::For { init, cond, step, body }
    }

    fn assign_list(&mut self) -> Vec1<Assign> {
        let mut assigns = Vec1::new(self.assign());
        while self.accept(&TokenKind::Comma).is_some() {
            assigns.push(self.assign());
        }
        assigns
    }

    fn assign(&mut self) -> Assign {
        let line = self.peek().line;
        let target = self.lval();
        self.accept(&TokenKind::Assign);
        let value = self.exp();
        Assign { target, value, line }
    }

    fn printf_stmt(&mut self) -> StmtKind {
        self.advance(); // printf
        self.accept(&TokenKind::LParen);
        let format = match self.kind().clone() {
            TokenKind::StrConst(content) => {
                self.advance();
                content
            }
            _ => String::new(),
        };
        let mut args = Vec::new();
        while self.accept(&TokenKind::Comma).is_some() {
            args.push(self.exp());
        }
        self.expect_rparen();
        self.expect_semicolon();
        StmtKind::Printf { format, args }
    }

    // ---- expressions ---------------------------------------------------

    fn lval(&mut self) -> LVal {
        let ident = self.ident();
        let index = self.accept(&TokenKind::LBracket).map(|_| {
            let index = self.exp();
            self.expect_rbracket();
            Box::new(index)
        });
        LVal { ident, index }
    }

    pub fn exp(&mut self) -> Exp {
        self.lor_exp()
    }

    fn binary_chain(
        &mut self,
        next: fn(&mut Self) -> Exp,
        op_for: fn(&TokenKind) -> Option<BinaryOp>,
    ) -> Exp {
        let start = self.pos;
        let mut lhs = next(self);
        while let Some(op) = op_for(self.kind()) {
            self.advance();
            let rhs = next(self);
            lhs = Exp {
                line: lhs.line,
                span: self.span_from(start),
                kind: ExpKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
            };
        }
        lhs
    }

    fn lor_exp(&mut self) -> Exp {
        self.binary_chain(Self::land_exp, |kind| {
            (*kind == TokenKind::OrOr).then_some(BinaryOp::Or)
        })
    }

    fn land_exp(&mut self) -> Exp {
        self.binary_chain(Self::eq_exp, |kind| {
            (*kind == TokenKind::AndAnd).then_some(BinaryOp::And)
        })
    }

    fn eq_exp(&mut self) -> Exp {
        self.binary_chain(Self::rel_exp, |kind| match kind {
            TokenKind::Eq => Some(BinaryOp::Eq),
            TokenKind::Ne => Some(BinaryOp::Ne),
            _ => None,
        })
    }

    fn rel_exp(&mut self) -> Exp {
        self.binary_chain(Self::add_exp, |kind| match kind {
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::Le => Some(BinaryOp::Le),
            TokenKind::Ge => Some(BinaryOp::Ge),
            _ => None,
        })
    }

    fn add_exp(&mut self) -> Exp {
        self.binary_chain(Self::mul_exp, |kind| match kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn mul_exp(&mut self) -> Exp {
        self.binary_chain(Self::unary_exp, |kind| match kind {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Mod),
            _ => None,
        })
    }

    fn unary_exp(&mut self) -> Exp {
        let op = match self.kind() {
            TokenKind::Plus => Some(UnaryOp::Pos),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Not => Some(UnaryOp::Not),
            _ => None,
        };
        match op {
            Some(op) => {
                let token = self.advance();
                let operand = self.unary_exp();
                Exp {
                    line: token.line,
                    span: token.span.to(operand.span),
                    kind: ExpKind::Unary { op, operand: Box::new(operand) },
                }
            }
            None => self.primary_exp(),
        }
    }

    fn primary_exp(&mut self) -> Exp {
        let start = self.pos;
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::LParen => {
                self.advance();
                let mut inner = self.exp();
                self.expect_rparen();
                inner.span = self.span_from(start);
                inner
            }
            TokenKind::IntConst(value) => {
                let value = *value;
                self.advance();
                Exp { kind: ExpKind::Number(value), line: token.line, span: token.span }
            }
            TokenKind::Ident(_) | TokenKind::Main => {
                if *self.nth_kind(1) == TokenKind::LParen {
                    self.call_exp(start)
                } else {
                    let lval = self.lval();
                    Exp {
                        line: token.line,
                        span: self.span_from(start),
                        kind: ExpKind::LVal(lval),
                    }
                }
            }
            _ => {
                // Unexpected token: skip it and stand in a zero.
                self.advance();
                Exp { kind: ExpKind::Number(0), line: token.line, span: token.span }
            }
        }
    }

    fn call_exp(&mut self, start: usize) -> Exp {
        let ident = self.ident();
        self.advance(); // (
        let mut args = Vec::new();
        if *self.kind() != TokenKind::RParen && *self.kind() != TokenKind::Semicolon {
            args.push(self.exp());
            while self.accept(&TokenKind::Comma).is_some() {
                args.push(self.exp());
            }
        }
        self.expect_rparen();
        Exp {
            line: ident.line,
            span: self.span_from(start),
            kind: ExpKind::Call { ident, args },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::lex;

    fn parse_ok(source: &str) -> CompUnit {
        let mut sink = DiagnosticSink::new();
        let unit = parse(source, &mut sink);
        assert!(sink.is_empty(), "unexpected diagnostics: {}", sink.dump());
        unit
    }

    fn parse(source: &str, sink: &mut DiagnosticSink) -> CompUnit {
        let tokens = lex(source, sink);
        Parser::new(tokens, sink).comp_unit()
    }

    #[test]
    fn minimal_main() {
        let unit = parse_ok("int main() { return 0; }");
        let main = unit.main.expect("main parsed");
        assert_eq!(main.ident.name, "main");
        assert_eq!(main.body.items.len(), 1);
    }

    #[test]
    fn declarations_functions_and_main() {
        let unit = parse_ok(
            "const int N = 5;\n\
             static int cache[10];\n\
             int a = 1, b;\n\
             void put(int x) { printf(\"%d\", x); }\n\
             int get(int arr[]) { return arr[0]; }\n\
             int main() { put(get(cache)); return 0; }",
        );
        assert_eq!(unit.decls.len(), 3);
        assert_eq!(unit.funcs.len(), 2);
        assert!(unit.main.is_some());
        assert!(unit.funcs[1].params[0].is_array);
    }

    #[test]
    fn precedence_builds_expected_tree() {
        let unit = parse_ok("int main() { return 1 + 2 * 3; }");
        let main = unit.main.unwrap();
        let BlockItem::Stmt(stmt) = &main.body.items[0] else { panic!() };
        let StmtKind::Return(Some(exp)) = &stmt.kind else { panic!() };
        let ExpKind::Binary { op: BinaryOp::Add, rhs, .. } = &exp.kind else {
            panic!("expected + at the top, got {exp:?}")
        };
        assert!(matches!(rhs.kind, ExpKind::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn for_with_declaration_init() {
        let unit = parse_ok("int main() { for (int i = 0; i < 3; i = i + 1) { } return 0; }");
        let main = unit.main.unwrap();
        let BlockItem::Stmt(stmt) = &main.body.items[0] else { panic!() };
        let StmtKind::For { init, cond, step, .. } = &stmt.kind else { panic!() };
        assert!(matches!(init, Some(ForInit::Decl(_))));
        assert!(cond.is_some());
        assert!(step.is_some());
    }

    #[test]
    fn missing_semicolon_reports_i_at_previous_line() {
        let mut sink = DiagnosticSink::new();
        parse("int main() {\n  int a = 1\n  return a;\n}", &mut sink);
        assert_eq!(sink.dump(), "2 i\n");
    }

    #[test]
    fn missing_rparen_reports_j() {
        let mut sink = DiagnosticSink::new();
        parse("int main() {\n  if (a == 1 {\n  }\n  return 0;\n}", &mut sink);
        assert!(sink.dump().contains("2 j"), "got: {}", sink.dump());
    }

    #[test]
    fn missing_rbracket_reports_k() {
        let mut sink = DiagnosticSink::new();
        parse("int main() {\n  int a[3 = {1, 2, 3};\n  return a[0];\n}", &mut sink);
        assert!(sink.dump().contains("2 k"), "got: {}", sink.dump());
    }

    #[test]
    fn printf_keeps_raw_format() {
        let unit = parse_ok("int main() { printf(\"a=%d\\n\", 1); return 0; }");
        let main = unit.main.unwrap();
        let BlockItem::Stmt(stmt) = &main.body.items[0] else { panic!() };
        let StmtKind::Printf { format, args } = &stmt.kind else { panic!() };
        assert_eq!(format, "a=%d\\n");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn short_circuit_operators_parse() {
        let unit = parse_ok("int main() { if (a && b || !c) return 1; return 0; }");
        let main = unit.main.unwrap();
        let BlockItem::Stmt(stmt) = &main.body.items[0] else { panic!() };
        let StmtKind::If { cond, .. } = &stmt.kind else { panic!() };
        assert!(matches!(cond.kind, ExpKind::Binary { op: BinaryOp::Or, .. }));
    }
}
