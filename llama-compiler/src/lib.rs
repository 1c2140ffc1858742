//! Statement dispatch and a Shunting-Yard expression compiler that lower a token
//! stream into a [`Module`] of bytecode, driving the back-patching builder in
//! `llama_bytecode::IrBuilder` for every structured-control-flow construct.

use std::collections::HashSet;

use llama_bytecode::{Argument, FunctionEntry, IrBuilder, Module};
use llama_core::diagnostics::{LogLevel, Status};
use llama_core::position::Position;
use llama_core::token::{Associativity, Token, TokenKind};
use llama_core::Logger;
use llama_scanner::Lexer;

/// Compiles `source` end to end: scan, refactor, then compile into a [`Module`]
/// whose function pool entry 0 is always the top-level program ("main").
pub fn compile(source: &str, log: &mut Logger) -> Result<Module, Status> {
    let tokens = Lexer::new(source).scan(log).map_err(|_| Status::Failure)?;
    let mut compiler = Compiler::new(tokens);
    compiler.compile_program(log)
}

struct FunctionScope {
    ir: IrBuilder,
    locals: HashSet<String>,
    func_idx: usize,
}

pub struct Compiler {
    tokens: Vec<Token>,
    pos: usize,
    module: Module,
    globals: HashSet<String>,
    const_globals: HashSet<String>,
    scopes: Vec<FunctionScope>,
}

impl Compiler {
    pub fn new(tokens: Vec<Token>) -> Self {
        Compiler { tokens, pos: 0, module: Module::new(), globals: HashSet::new(), const_globals: HashSet::new(), scopes: Vec::new() }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.tokens.get(self.pos).map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    fn peek_at(&self, offset: usize) -> TokenKind {
        self.tokens.get(self.pos + offset).map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or_else(|| Token::new(TokenKind::Eof, "", Position::unknown()));
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn expect(&mut self, kind: TokenKind, log: &mut Logger, what: &str) -> Result<Token, Status> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            let position = self.peek().position;
            log.log(LogLevel::SyntaxError, position, format!("expected {what}, found {:?}", self.peek_kind()));
            Err(Status::Failure)
        }
    }

    fn ir(&mut self) -> &mut IrBuilder {
        &mut self.scopes.last_mut().expect("compiler scope stack must never be empty").ir
    }

    fn declare_local(&mut self, name: &str) -> bool {
        self.scopes.last_mut().unwrap().locals.insert(name.to_string())
    }

    /// Entry point: "main" occupies function-pool slot 0 and owns the top-level
    /// statement sequence, matching the original's convention of running a module
    /// by invoking its first function.
    pub fn compile_program(&mut self, log: &mut Logger) -> Result<Module, Status> {
        let main_idx = self.module.funcs.add(FunctionEntry::new("main"));
        self.scopes.push(FunctionScope { ir: IrBuilder::new(), locals: HashSet::new(), func_idx: main_idx });

        self.predeclare_functions(log)?;

        while !self.at_end() {
            self.compile_statement(log)?;
        }

        let scope = self.scopes.pop().unwrap();
        let bytes = {
            let mut out = Vec::new();
            scope.ir.build(&mut out);
            out
        };
        self.module.funcs.at_mut(main_idx).unwrap().data = bytes;

        Ok(std::mem::replace(&mut self.module, Module::new()))
    }

    /// Pre-registers every top-level `fn` signature so forward references and
    /// recursive calls resolve to a function-pool index before any body compiles.
    fn predeclare_functions(&mut self, log: &mut Logger) -> Result<(), Status> {
        let save = self.pos;
        let mut depth = 0i32;
        while !self.at_end() {
            let kind = self.peek_kind();
            if kind.is_lscope() {
                depth += 1;
            } else if kind.is_rscope() {
                depth -= 1;
            }
            if depth == 0 && kind == TokenKind::Fn {
                let fn_pos = self.pos;
                self.advance();
                let name_tok = self.expect(TokenKind::Label, log, "function name")?;
                let args = self.parse_param_list(log)?;
                if self.module.funcs.has(&name_tok.lexeme) {
                    log.log(LogLevel::SyntaxError, name_tok.position, format!("function '{}' already declared", name_tok.lexeme));
                    return Err(Status::Failure);
                }
                let mut entry = FunctionEntry::new(name_tok.lexeme.clone());
                entry.args = args;
                entry.line = name_tok.position.line;
                self.module.funcs.add(entry);
                self.skip_balanced_braces(log)?;
                let _ = fn_pos;
                continue;
            }
            self.advance();
        }
        self.pos = save;
        Ok(())
    }

    fn parse_param_list(&mut self, log: &mut Logger) -> Result<Vec<Argument>, Status> {
        self.expect(TokenKind::LParen, log, "'('")?;
        let mut args = Vec::new();
        while self.peek_kind() != TokenKind::RParen {
            let field = self.expect(TokenKind::Label, log, "parameter name")?.lexeme;
            let mut type_name = String::new();
            if self.peek_kind() == TokenKind::Colon {
                self.advance();
                type_name = self.parse_type_name(log)?;
            }
            args.push(Argument { field, type_name, optional: false });
            if self.peek_kind() == TokenKind::Comma {
                self.advance();
            }
        }
        self.expect(TokenKind::RParen, log, "')'")?;
        Ok(args)
    }

    fn parse_type_name(&mut self, log: &mut Logger) -> Result<String, Status> {
        let tok = self.advance();
        let name = match tok.kind {
            TokenKind::IntType | TokenKind::FloatType | TokenKind::BoolType | TokenKind::Label => tok.lexeme.clone(),
            _ => {
                log.log(LogLevel::SyntaxError, tok.position, "expected a type name");
                return Err(Status::Failure);
            }
        };
        Ok(name)
    }

    fn skip_balanced_braces(&mut self, log: &mut Logger) -> Result<(), Status> {
        self.expect(TokenKind::LBrace, log, "'{'")?;
        let mut depth = 1;
        while depth > 0 {
            if self.at_end() {
                log.log(LogLevel::SyntaxError, self.peek().position, "unterminated function body");
                return Err(Status::Failure);
            }
            match self.peek_kind() {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                _ => {}
            }
            self.advance();
        }
        Ok(())
    }

    // -- statements ----------------------------------------------------------

    fn compile_statement(&mut self, log: &mut Logger) -> Result<(), Status> {
        match self.peek_kind() {
            TokenKind::Var | TokenKind::Let | TokenKind::Const => self.compile_decl(log, false),
            TokenKind::Export => {
                self.advance();
                self.compile_decl(log, true)
            }
            TokenKind::Import => self.compile_import(log),
            TokenKind::If => self.compile_if(log),
            TokenKind::While => self.compile_while(log),
            TokenKind::Loop => self.compile_loop(log),
            TokenKind::Do => self.compile_do_while(log),
            TokenKind::LBrace => self.compile_block(log),
            TokenKind::Fn => self.compile_fn(log),
            TokenKind::Return => self.compile_return(log),
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semicolon, log, "';'")?;
                self.ir().break_op();
                Ok(())
            }
            TokenKind::Repeat => {
                self.advance();
                self.expect(TokenKind::Semicolon, log, "';'")?;
                self.ir().repeat();
                Ok(())
            }
            TokenKind::Class | TokenKind::For => {
                let position = self.peek().position;
                log.log(LogLevel::SyntaxError, position, "class and for are not supported statements");
                Err(Status::Failure)
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(())
            }
            _ => self.compile_expr_statement(log),
        }
    }

    fn compile_import(&mut self, log: &mut Logger) -> Result<(), Status> {
        self.advance();
        self.expect(TokenKind::String, log, "a module path string")?;
        self.expect(TokenKind::Semicolon, log, "';'")?;
        if cfg!(feature = "verbose") {
            eprintln!("[LOG] import statement parsed but ignored: no module loader in this workspace");
        }
        Ok(())
    }

    fn compile_decl(&mut self, log: &mut Logger, force_global: bool) -> Result<(), Status> {
        let is_const = self.peek_kind() == TokenKind::Const;
        self.advance();
        let name_tok = self.expect(TokenKind::Label, log, "a variable name")?;

        let mut type_name = String::new();
        if self.peek_kind() == TokenKind::Colon {
            self.advance();
            type_name = self.parse_type_name(log)?;
        }

        let has_init = self.peek_kind() == TokenKind::Equal;
        if has_init {
            self.advance();
            self.compile_expr(log)?;
        } else {
            self.ir().push_null();
        }
        self.expect(TokenKind::Semicolon, log, "';'")?;

        if !type_name.is_empty() {
            self.scopes.last_mut().unwrap().ir.typecheck(&mut self.module.consts, &type_name);
        }

        let is_top_level = self.scopes.len() == 1;
        let make_global = force_global || is_top_level;

        if make_global {
            if !self.globals.insert(name_tok.lexeme.clone()) {
                log.log(LogLevel::SyntaxError, name_tok.position, format!("global '{}' already declared", name_tok.lexeme));
                return Err(Status::Failure);
            }
            self.scopes.last_mut().unwrap().ir.new_global(&mut self.module.consts, &name_tok.lexeme);
            self.scopes.last_mut().unwrap().ir.set_global(&mut self.module.consts, &name_tok.lexeme, 0);
        } else {
            if !self.declare_local(&name_tok.lexeme) {
                log.log(LogLevel::SyntaxError, name_tok.position, format!("local '{}' already declared in this scope", name_tok.lexeme));
                return Err(Status::Failure);
            }
            self.scopes.last_mut().unwrap().ir.new_local(&mut self.module.consts, &name_tok.lexeme);
            self.scopes.last_mut().unwrap().ir.set_global(&mut self.module.consts, &name_tok.lexeme, 0);
        }

        if is_const && make_global {
            self.const_globals.insert(name_tok.lexeme.clone());
        }
        Ok(())
    }

    fn compile_if(&mut self, log: &mut Logger) -> Result<(), Status> {
        self.advance();
        self.compile_expr(log)?;
        self.ir().push_if();
        self.compile_block(log)?;
        if self.peek_kind() == TokenKind::Else {
            self.advance();
            self.ir().push_else();
            if self.peek_kind() == TokenKind::If {
                self.compile_if(log)?;
            } else {
                self.compile_block(log)?;
            }
        }
        self.ir().end_block();
        Ok(())
    }

    fn compile_while(&mut self, log: &mut Logger) -> Result<(), Status> {
        self.advance();
        self.ir().push_loop();
        self.compile_expr(log)?;
        self.ir().not_op();
        self.ir().push_if();
        self.ir().break_op();
        self.ir().end_block();
        self.compile_block(log)?;
        self.ir().repeat();
        self.ir().end_block();
        Ok(())
    }

    fn compile_do_while(&mut self, log: &mut Logger) -> Result<(), Status> {
        self.advance();
        self.ir().push_loop();
        self.compile_block(log)?;
        self.expect(TokenKind::While, log, "'while'")?;
        self.compile_expr(log)?;
        self.expect(TokenKind::Semicolon, log, "';'")?;
        self.ir().not_op();
        self.ir().push_if();
        self.ir().break_op();
        self.ir().end_block();
        self.ir().repeat();
        self.ir().end_block();
        Ok(())
    }

    fn compile_loop(&mut self, log: &mut Logger) -> Result<(), Status> {
        self.advance();
        self.ir().push_loop();
        self.compile_block(log)?;
        self.ir().repeat();
        self.ir().end_block();
        Ok(())
    }

    fn compile_block(&mut self, log: &mut Logger) -> Result<(), Status> {
        self.expect(TokenKind::LBrace, log, "'{'")?;
        self.ir().push_block();
        while self.peek_kind() != TokenKind::RBrace {
            if self.at_end() {
                log.log(LogLevel::SyntaxError, self.peek().position, "unterminated block");
                return Err(Status::Failure);
            }
            self.compile_statement(log)?;
        }
        self.advance();
        self.ir().end_block();
        Ok(())
    }

    fn compile_fn(&mut self, log: &mut Logger) -> Result<(), Status> {
        self.advance();
        let name_tok = self.expect(TokenKind::Label, log, "function name")?;
        let func_idx = self
            .module
            .funcs
            .get(&name_tok.lexeme)
            .expect("predeclare_functions must have registered every top-level fn");
        let args: Vec<String> = self.module.funcs.at(func_idx).unwrap().args.iter().map(|a| a.field.clone()).collect();

        // Re-parse (and discard) the parameter list; signature already recorded.
        self.parse_param_list(log)?;

        self.scopes.push(FunctionScope { ir: IrBuilder::new(), locals: HashSet::new(), func_idx });
        for name in &args {
            self.declare_local(name);
            self.scopes.last_mut().unwrap().ir.new_local(&mut self.module.consts, name);
        }
        self.compile_block(log)?;
        self.ir().push_null();
        self.ir().return_op();

        let scope = self.scopes.pop().unwrap();
        let mut bytes = Vec::new();
        scope.ir.build(&mut bytes);
        self.module.funcs.at_mut(scope.func_idx).unwrap().data = bytes;
        Ok(())
    }

    fn compile_return(&mut self, log: &mut Logger) -> Result<(), Status> {
        self.advance();
        if self.peek_kind() == TokenKind::Semicolon {
            self.advance();
            self.ir().returnv();
        } else {
            self.compile_expr(log)?;
            self.expect(TokenKind::Semicolon, log, "';'")?;
            self.ir().return_op();
        }
        Ok(())
    }

    fn compile_expr_statement(&mut self, log: &mut Logger) -> Result<(), Status> {
        if self.peek_kind() == TokenKind::Label && self.peek_at(1) == TokenKind::Equal {
            let name_tok = self.advance();
            self.advance(); // '='
            if self.const_globals.contains(&name_tok.lexeme) {
                log.log(LogLevel::SyntaxError, name_tok.position, format!("cannot assign to '{}', it was declared const", name_tok.lexeme));
                return Err(Status::Failure);
            }
            self.compile_expr(log)?;
            self.expect(TokenKind::Semicolon, log, "';'")?;
            self.scopes.last_mut().unwrap().ir.set_global(&mut self.module.consts, &name_tok.lexeme, 0);
            return Ok(());
        }
        self.compile_expr(log)?;
        self.expect(TokenKind::Semicolon, log, "';'")?;
        self.ir().popn(1);
        Ok(())
    }

    // -- expressions: Shunting-Yard -----------------------------------------

    fn compile_expr(&mut self, log: &mut Logger) -> Result<(), Status> {
        let mut operators: Vec<Token> = Vec::new();
        let mut group_opens = 0usize;
        let mut expect_operand = true;

        loop {
            let kind = self.peek_kind();

            if expect_operand {
                self.compile_primary(log, &mut operators, &mut group_opens)?;
                expect_operand = false;
                continue;
            }

            // A `)` we did not open ourselves (via grouping) belongs to an
            // enclosing call's argument list; a `,` always terminates the
            // current argument expression. Neither is consumed here.
            if kind == TokenKind::RParen && group_opens == 0 {
                break;
            }
            if matches!(kind, TokenKind::Comma | TokenKind::Colon) {
                break;
            }

            if kind == TokenKind::RParen {
                self.advance();
                loop {
                    let op = operators.pop().expect("grouping paren tracked without matching operator");
                    if op.kind == TokenKind::LParen {
                        break;
                    }
                    self.apply_operator(op, log)?;
                }
                group_opens -= 1;
                expect_operand = false;
                continue;
            }

            if kind.precedence().is_some() && !kind.is_internal() {
                let tok = self.advance();
                while let Some(top) = operators.last() {
                    if top.kind != TokenKind::LParen
                        && top.kind.precedence().is_some()
                        && (top.kind.precedence() > tok.kind.precedence()
                            || (top.kind.precedence() == tok.kind.precedence() && tok.kind.associativity() == Associativity::Left))
                    {
                        let op = operators.pop().unwrap();
                        self.apply_operator(op, log)?;
                    } else {
                        break;
                    }
                }
                operators.push(tok);
                expect_operand = true;
                continue;
            }

            break;
        }

        while let Some(op) = operators.pop() {
            if op.kind == TokenKind::LParen {
                log.log(LogLevel::SyntaxError, op.position, "unmatched '(' in expression");
                return Err(Status::Failure);
            }
            self.apply_operator(op, log)?;
        }
        Ok(())
    }

    fn compile_primary(&mut self, log: &mut Logger, operators: &mut Vec<Token>, group_opens: &mut usize) -> Result<(), Status> {
        match self.peek_kind() {
            TokenKind::UnaryPlus | TokenKind::UnaryMinus | TokenKind::Not => {
                let tok = self.advance();
                self.compile_primary(log, operators, group_opens)?;
                match tok.kind {
                    TokenKind::UnaryMinus => self.ir().negate(),
                    TokenKind::UnaryPlus => self.ir().promote(),
                    TokenKind::Not => self.ir().not_op(),
                    _ => unreachable!(),
                }
                Ok(())
            }
            TokenKind::Integer => {
                let tok = self.advance();
                let v: i32 = parse_radix_int(&tok.lexeme).ok_or(()).map_err(|_| {
                    log.log(LogLevel::SyntaxError, tok.position, "malformed integer literal");
                    Status::Failure
                })?;
                self.scopes.last_mut().unwrap().ir.push_int(&mut self.module.consts, v);
                Ok(())
            }
            TokenKind::Decimal => {
                let tok = self.advance();
                let v: f64 = tok.lexeme.replace('_', "").parse().map_err(|_| {
                    log.log(LogLevel::SyntaxError, tok.position, "malformed decimal literal");
                    Status::Failure
                })?;
                self.scopes.last_mut().unwrap().ir.push_float(&mut self.module.consts, v);
                Ok(())
            }
            TokenKind::String | TokenKind::RawString | TokenKind::Character => {
                let tok = self.advance();
                self.scopes.last_mut().unwrap().ir.push_string(&mut self.module.consts, &tok.lexeme);
                Ok(())
            }
            TokenKind::Null => {
                self.advance();
                self.ir().push_null();
                Ok(())
            }
            TokenKind::True => {
                self.advance();
                self.ir().push_true();
                Ok(())
            }
            TokenKind::False => {
                self.advance();
                self.ir().push_false();
                Ok(())
            }
            TokenKind::LParen => {
                let tok = self.advance();
                operators.push(tok);
                *group_opens += 1;
                Ok(())
            }
            TokenKind::Label => self.compile_label_primary(log),
            _ => {
                let position = self.peek().position;
                log.log(LogLevel::SyntaxError, position, format!("unexpected token {:?} in expression", self.peek_kind()));
                Err(Status::Failure)
            }
        }
    }

    fn compile_label_primary(&mut self, log: &mut Logger) -> Result<(), Status> {
        let name_tok = self.advance();
        if self.peek_kind() == TokenKind::LParen {
            self.advance();
            if self.peek_kind() == TokenKind::CallStart {
                self.advance();
            }
            let mut argc = 0;
            if self.peek_kind() != TokenKind::RParen {
                loop {
                    self.compile_expr(log)?;
                    argc += 1;
                    if self.peek_kind() == TokenKind::Comma {
                        self.advance();
                        continue;
                    }
                    break;
                }
            }
            self.expect(TokenKind::RParen, log, "')'")?;
            if self.peek_kind() == TokenKind::CallEnd {
                self.advance();
            }
            match self.module.funcs.get(&name_tok.lexeme) {
                Some(idx) => self.ir().call(idx as i32),
                None => {
                    log.log(LogLevel::SyntaxError, name_tok.position, format!("call to unknown function '{}'", name_tok.lexeme));
                    return Err(Status::Failure);
                }
            }
            let _ = argc;
        } else {
            self.scopes.last_mut().unwrap().ir.get_global(&mut self.module.consts, &name_tok.lexeme);
        }
        Ok(())
    }

    fn apply_operator(&mut self, op: Token, log: &mut Logger) -> Result<(), Status> {
        match op.kind {
            TokenKind::Plus => self.ir().add(),
            TokenKind::Minus => self.ir().sub(),
            TokenKind::Multiply => self.ir().mul(),
            TokenKind::Divide => self.ir().div(),
            TokenKind::Modulo => self.ir().mod_op(),
            TokenKind::Power => self.ir().pow(),
            TokenKind::EqualEqual => self.ir().eq(),
            TokenKind::NotEqual => self.ir().ne(),
            TokenKind::Less => self.ir().lt(),
            TokenKind::LessEqual => self.ir().le(),
            TokenKind::Greater => self.ir().gt(),
            TokenKind::GreaterEqual => self.ir().ge(),
            TokenKind::And => self.ir().and_op(),
            TokenKind::Or => self.ir().or_op(),
            TokenKind::As => {
                log.log(LogLevel::SyntaxError, op.position, "'as' requires a type name, not a general expression");
                return Err(Status::Failure);
            }
            TokenKind::LParen | TokenKind::RParen => {}
            other => {
                log.log(LogLevel::SyntaxError, op.position, format!("operator {other:?} cannot appear in this position"));
                return Err(Status::Failure);
            }
        }
        Ok(())
    }
}

fn parse_radix_int(lexeme: &str) -> Option<i32> {
    let clean: String = lexeme.chars().filter(|c| *c != '_').collect();
    if let Some(rest) = clean.strip_prefix("0x").or_else(|| clean.strip_prefix("0X")) {
        return i32::from_str_radix(rest, 16).ok();
    }
    if let Some(rest) = clean.strip_prefix("0o").or_else(|| clean.strip_prefix("0O")) {
        return i32::from_str_radix(rest, 8).ok();
    }
    if let Some(rest) = clean.strip_prefix("0b").or_else(|| clean.strip_prefix("0B")) {
        return i32::from_str_radix(rest, 2).ok();
    }
    clean.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_ok(src: &str) -> Module {
        let mut log = Logger::new();
        log.set_recoverable(true);
        compile(src, &mut log).expect("compile should succeed")
    }

    #[test]
    fn global_arithmetic_declares_and_assigns() {
        let module = compile_ok("var x = 1 + 2 * 3;");
        let main = module.funcs.at(0).unwrap();
        assert!(!main.data.is_empty());
    }

    #[test]
    fn redeclared_global_is_a_compile_error() {
        let mut log = Logger::new();
        log.set_recoverable(true);
        let result = compile("export var x = 1; export var x = 2;", &mut log);
        assert!(result.is_err());
    }

    #[test]
    fn function_calls_resolve_against_the_predeclared_pool() {
        let module = compile_ok("fn sq(x) { return x * x; } var r = sq(5);");
        assert_eq!(module.funcs.size(), 2);
        assert_eq!(module.funcs.at(1).unwrap().name, "sq");
    }

    #[test]
    fn class_statement_is_rejected() {
        let mut log = Logger::new();
        log.set_recoverable(true);
        let result = compile("class Foo { }", &mut log);
        assert!(result.is_err());
    }

    #[test]
    fn while_loop_compiles_without_error() {
        compile_ok("var i = 0; while i < 10 { i = i + 1; }");
    }
}
