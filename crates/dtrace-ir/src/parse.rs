//! Textual IR reader.
//!
//! Accepts the same syntax the `Display` impls print, an LLVM-like subset:
//!
//! ```text
//! module "add.c"
//! @.str = internal constant c"hello"
//! declare void @hook(i32, ...)
//! define i32 @add(i32 %a, i32 %b) {
//! entry:
//!   %sum = add i32 %a, %b
//!   ret i32 %sum
//! }
//! ```
//!
//! `;` starts a comment that runs to the end of the line.

use thiserror::Error;

use crate::block::Block;
use crate::instr::{BinaryOp, CastOp, CmpPred, Instr, InstrKind};
use crate::module::{Constant, Function, Global, Linkage, Module, Param};
use crate::operand::{Operand, Typed};
use crate::terminator::Terminator;
use crate::types::Type;

/// IR reader errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: function @{name} has no closing brace")]
    UnterminatedBody { line: usize, name: String },
    #[error("line {line}: block %{label} has no terminator")]
    MissingTerminator { line: usize, label: String },
    #[error("duplicate definition of @{0}")]
    DuplicateFunction(String),
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Parse a whole module. `default_name` is used when no `module` line is present.
pub fn parse_module(text: &str, default_name: &str) -> ParseResult<Module> {
    let mut module = Module::new(default_name);
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, strip_comment(l).trim()))
        .filter(|(_, l)| !l.is_empty())
        .collect();

    let mut idx = 0;
    while idx < lines.len() {
        let (line_no, line) = lines[idx];
        let mut cur = Cursor::new(line, line_no);
        if cur.eat_keyword("module") {
            module.name = cur.string_literal()?;
            cur.finish()?;
            idx += 1;
        } else if line.starts_with('@') {
            module.globals.push(parse_global(&mut cur)?);
            idx += 1;
        } else if cur.eat_keyword("declare") {
            let (function, _) = parse_signature(&mut cur)?;
            cur.finish()?;
            if module.function(&function.name).is_none() {
                module.functions.push(function);
            }
            idx += 1;
        } else if cur.eat_keyword("define") {
            let (mut function, has_body) = parse_signature(&mut cur)?;
            cur.finish()?;
            if !has_body {
                return Err(cur.error("expected '{' after function signature"));
            }
            if module.function(&function.name).is_some_and(|f| !f.is_declaration()) {
                return Err(ParseError::DuplicateFunction(function.name));
            }
            let end = parse_body(&lines, idx + 1, &mut function)?;
            module.add_function(function);
            idx = end + 1;
        } else {
            return Err(cur.error("expected 'module', 'declare', 'define' or a global"));
        }
    }
    Ok(module)
}

/// Parse a single type, e.g. `double*` or `[4 x i32]`.
pub fn parse_type(text: &str) -> ParseResult<Type> {
    let mut cur = Cursor::new(text.trim(), 1);
    let ty = cur.ty()?;
    cur.finish()?;
    Ok(ty)
}

fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_string = !in_string,
            ';' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

fn parse_global(cur: &mut Cursor<'_>) -> ParseResult<Global> {
    cur.expect("@")?;
    let name = cur.ident()?;
    cur.expect("=")?;
    let linkage = if cur.eat_keyword("internal") {
        Linkage::Internal
    } else {
        cur.eat_keyword("external");
        Linkage::External
    };
    let constant = if cur.eat_keyword("constant") {
        true
    } else if cur.eat_keyword("global") {
        false
    } else {
        return Err(cur.error("expected 'constant' or 'global'"));
    };
    let init = if cur.eat("c\"") {
        Constant::CString(cur.c_string_body()?)
    } else {
        let ty = cur.ty()?;
        let value = cur.int()?;
        Constant::Int(ty, value)
    };
    cur.finish()?;
    Ok(Global {
        name,
        linkage,
        constant,
        init,
    })
}

/// Parse `RET @name(params) [{]`, returning the function and whether a body follows.
fn parse_signature(cur: &mut Cursor<'_>) -> ParseResult<(Function, bool)> {
    let ret = cur.ty()?;
    cur.expect("@")?;
    let name = cur.ident()?;
    cur.expect("(")?;
    let mut params = Vec::new();
    let mut variadic = false;
    if !cur.eat(")") {
        loop {
            if cur.eat("...") {
                variadic = true;
                cur.expect(")")?;
                break;
            }
            let ty = cur.ty()?;
            let pname = if cur.eat("%") { cur.ident()? } else { String::new() };
            params.push(Param::new(pname, ty));
            if cur.eat(")") {
                break;
            }
            cur.expect(",")?;
        }
    }
    let has_body = cur.eat("{");
    Ok((Function::declare(name, ret, params, variadic), has_body))
}

/// Parse body lines starting at `start`; returns the index of the closing brace line.
fn parse_body(lines: &[(usize, &str)], start: usize, function: &mut Function) -> ParseResult<usize> {
    let mut current: Option<(Block, bool)> = None;
    let mut idx = start;
    while idx < lines.len() {
        let (line_no, line) = lines[idx];
        if line == "}" {
            if let Some((block, terminated)) = current.take() {
                close_block(function, block, terminated, line_no)?;
            }
            return Ok(idx);
        }

        if let Some(label) = line.strip_suffix(':').filter(|l| is_ident(l)) {
            if let Some((block, terminated)) = current.take() {
                close_block(function, block, terminated, line_no)?;
            }
            current = Some((Block::new(label), false));
            idx += 1;
            continue;
        }

        let mut cur = Cursor::new(line, line_no);
        let (block, terminated) = current.get_or_insert_with(|| (Block::new("entry"), false));
        if *terminated {
            return Err(cur.error("instruction after terminator; start a new block with a label"));
        }
        match parse_line(&mut cur)? {
            Line::Instr(instr) => block.push(instr),
            Line::Term(term) => {
                block.terminator = term;
                *terminated = true;
            }
        }
        cur.finish()?;
        idx += 1;
    }
    Err(ParseError::UnterminatedBody {
        line: lines.get(start.saturating_sub(1)).map_or(0, |(n, _)| *n),
        name: function.name.clone(),
    })
}

fn close_block(function: &mut Function, block: Block, terminated: bool, line: usize) -> ParseResult<()> {
    if !terminated {
        return Err(ParseError::MissingTerminator {
            line,
            label: block.label,
        });
    }
    function.blocks.push(block);
    Ok(())
}

enum Line {
    Instr(Instr),
    Term(Terminator),
}

fn parse_line(cur: &mut Cursor<'_>) -> ParseResult<Line> {
    let result = if cur.eat("%") {
        let name = cur.ident()?;
        cur.expect("=")?;
        Some(name)
    } else {
        None
    };

    let opcode = cur.ident()?;
    let kind = match opcode.as_str() {
        "ret" => {
            if cur.eat_keyword("void") {
                return Ok(Line::Term(Terminator::ret_void()));
            }
            return Ok(Line::Term(Terminator::ret(cur.typed()?)));
        }
        "br" => {
            if cur.eat_keyword("label") {
                cur.expect("%")?;
                return Ok(Line::Term(Terminator::br(cur.ident()?)));
            }
            let _ = cur.ty()?;
            let cond = cur.operand()?;
            cur.expect(",")?;
            let then_label = cur.label()?;
            cur.expect(",")?;
            let else_label = cur.label()?;
            return Ok(Line::Term(Terminator::cond_br(cond, then_label, else_label)));
        }
        "unreachable" => return Ok(Line::Term(Terminator::Unreachable)),
        "alloca" => InstrKind::Alloca { ty: cur.ty()? },
        "load" => {
            let ty = cur.ty()?;
            cur.expect(",")?;
            InstrKind::Load { ty, ptr: cur.typed()? }
        }
        "store" => {
            let value = cur.typed()?;
            cur.expect(",")?;
            InstrKind::Store {
                value,
                ptr: cur.typed()?,
            }
        }
        "icmp" => {
            let pred_name = cur.ident()?;
            let pred = CmpPred::from_mnemonic(&pred_name)
                .ok_or_else(|| cur.error(&format!("unknown predicate '{pred_name}'")))?;
            let ty = cur.ty()?;
            let lhs = cur.operand()?;
            cur.expect(",")?;
            InstrKind::ICmp {
                pred,
                ty,
                lhs,
                rhs: cur.operand()?,
            }
        }
        "call" => {
            let ret = cur.ty()?;
            cur.expect("@")?;
            let callee = cur.ident()?;
            cur.expect("(")?;
            let mut args = Vec::new();
            if !cur.eat(")") {
                loop {
                    args.push(cur.typed()?);
                    if cur.eat(")") {
                        break;
                    }
                    cur.expect(",")?;
                }
            }
            InstrKind::Call { callee, ret, args }
        }
        other => {
            if let Some(op) = CastOp::from_mnemonic(other) {
                let value = cur.typed()?;
                if !cur.eat_keyword("to") {
                    return Err(cur.error("expected 'to'"));
                }
                InstrKind::Cast {
                    op,
                    value,
                    to: cur.ty()?,
                }
            } else {
                let op = BinaryOp::from_mnemonic(other)
                    .ok_or_else(|| cur.error(&format!("unknown opcode '{other}'")))?;
                let ty = cur.ty()?;
                let lhs = cur.operand()?;
                cur.expect(",")?;
                InstrKind::Binary {
                    op,
                    ty,
                    lhs,
                    rhs: cur.operand()?,
                }
            }
        }
    };
    Ok(Line::Instr(Instr { result, kind }))
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$')
}

fn is_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_ident_char)
}

/// Character cursor over one line.
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    const fn new(src: &'a str, line: usize) -> Self {
        Self { src, pos: 0, line }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::Syntax {
            line: self.line,
            message: format!("{message} (at column {})", self.pos + 1),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    /// Like `eat`, but only matches a whole word.
    fn eat_keyword(&mut self, word: &str) -> bool {
        self.skip_ws();
        let rest = self.rest();
        if rest.starts_with(word) && !rest[word.len()..].starts_with(is_ident_char) {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> ParseResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{token}'")))
        }
    }

    fn finish(&mut self) -> ParseResult<()> {
        self.skip_ws();
        if self.rest().is_empty() {
            Ok(())
        } else {
            Err(self.error(&format!("unexpected trailing input '{}'", self.rest())))
        }
    }

    fn ident(&mut self) -> ParseResult<String> {
        self.skip_ws();
        let len = self
            .rest()
            .find(|c: char| !is_ident_char(c))
            .unwrap_or(self.rest().len());
        if len == 0 {
            return Err(self.error("expected identifier"));
        }
        let ident = self.rest()[..len].to_string();
        self.pos += len;
        Ok(ident)
    }

    fn label(&mut self) -> ParseResult<String> {
        if !self.eat_keyword("label") {
            return Err(self.error("expected 'label'"));
        }
        self.expect("%")?;
        self.ident()
    }

    fn number_token(&mut self) -> ParseResult<&'a str> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|&(i, c)| {
                !(c.is_ascii_alphanumeric() || c == '.' || ((c == '-' || c == '+') && (i == 0 || rest[..i].ends_with(['e', 'E']))))
            })
            .map_or(rest.len(), |(i, _)| i);
        if len == 0 {
            return Err(self.error("expected number"));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn int(&mut self) -> ParseResult<i64> {
        let token = self.number_token()?;
        token
            .parse()
            .map_err(|_| self.error(&format!("invalid integer '{token}'")))
    }

    fn string_literal(&mut self) -> ParseResult<String> {
        self.expect("\"")?;
        let rest = self.rest();
        let end = rest
            .find('"')
            .ok_or_else(|| self.error("unterminated string"))?;
        let value = rest[..end].to_string();
        self.pos += end + 1;
        Ok(value)
    }

    /// Body of `c"..."` after the opening quote; `\HH` escapes are hex bytes.
    fn c_string_body(&mut self) -> ParseResult<String> {
        let mut bytes = Vec::new();
        let rest = self.rest().as_bytes();
        let mut i = 0;
        loop {
            match rest.get(i) {
                None => return Err(self.error("unterminated string")),
                Some(b'"') => break,
                Some(b'\\') => {
                    let hex = rest
                        .get(i + 1..i + 3)
                        .and_then(|h| std::str::from_utf8(h).ok())
                        .and_then(|h| u8::from_str_radix(h, 16).ok())
                        .ok_or_else(|| self.error("invalid escape in string"))?;
                    bytes.push(hex);
                    i += 3;
                }
                Some(&b) => {
                    bytes.push(b);
                    i += 1;
                }
            }
        }
        self.pos += i + 1;
        // Trailing NUL terminators are implicit.
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn ty(&mut self) -> ParseResult<Type> {
        self.skip_ws();
        let mut ty = if self.eat("[") {
            let len = self.int()?;
            if !self.eat_keyword("x") {
                return Err(self.error("expected 'x' in array type"));
            }
            let elem = self.ty()?;
            self.expect("]")?;
            Type::Array(
                u64::try_from(len).map_err(|_| self.error("negative array length"))?,
                Box::new(elem),
            )
        } else if self.eat("<") {
            let len = self.int()?;
            if !self.eat_keyword("x") {
                return Err(self.error("expected 'x' in vector type"));
            }
            let elem = self.ty()?;
            self.expect(">")?;
            Type::Vector(
                u32::try_from(len).map_err(|_| self.error("invalid vector length"))?,
                Box::new(elem),
            )
        } else if self.eat("{") {
            let mut fields = Vec::new();
            if !self.eat("}") {
                loop {
                    fields.push(self.ty()?);
                    if self.eat("}") {
                        break;
                    }
                    self.expect(",")?;
                }
            }
            Type::Struct(fields)
        } else {
            let word = self.ident()?;
            match word.as_str() {
                "void" => Type::Void,
                "float" => Type::Float,
                "double" => Type::Double,
                w => w
                    .strip_prefix('i')
                    .and_then(|bits| bits.parse::<u32>().ok())
                    .filter(|&bits| bits > 0)
                    .map(Type::Int)
                    .ok_or_else(|| self.error(&format!("unknown type '{w}'")))?,
            }
        };
        while self.eat("*") {
            ty = ty.ptr_to();
        }
        Ok(ty)
    }

    fn operand(&mut self) -> ParseResult<Operand> {
        if self.eat("%") {
            return Ok(Operand::Local(self.ident()?));
        }
        if self.eat("@") {
            return Ok(Operand::Global(self.ident()?));
        }
        if self.eat_keyword("true") {
            return Ok(Operand::ConstInt(1));
        }
        if self.eat_keyword("false") {
            return Ok(Operand::ConstInt(0));
        }
        let token = self.number_token()?;
        let lower = token.to_ascii_lowercase();
        match lower.as_str() {
            "nan" => return Ok(Operand::ConstFloat(f64::NAN)),
            "inf" | "+inf" => return Ok(Operand::ConstFloat(f64::INFINITY)),
            "-inf" => return Ok(Operand::ConstFloat(f64::NEG_INFINITY)),
            _ => {}
        }
        if let Ok(value) = token.parse::<i64>() {
            return Ok(Operand::ConstInt(value));
        }
        token
            .parse::<f64>()
            .map(Operand::ConstFloat)
            .map_err(|_| self.error(&format!("invalid operand '{token}'")))
    }

    fn typed(&mut self) -> ParseResult<Typed> {
        let ty = self.ty()?;
        let value = self.operand()?;
        Ok(Typed::new(ty, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD: &str = r#"
; simple adder
module "add.c"

define i32 @add(i32 %a, i32 %b) {
entry:
  %a.addr = alloca i32
  store i32 %a, i32* %a.addr
  %sum = add i32 %a, %b
  ret i32 %sum
}
"#;

    #[test]
    fn test_parse_simple_function() {
        let module = parse_module(ADD, "fallback").unwrap();
        assert_eq!(module.name, "add.c");
        let add = module.function("add").unwrap();
        assert_eq!(add.params.len(), 2);
        assert_eq!(add.params[1], Param::new("b", Type::I32));
        assert_eq!(add.blocks.len(), 1);
        assert_eq!(add.blocks[0].instructions.len(), 3);
        assert!(add.blocks[0].instructions[0].is_alloca());
        assert_eq!(
            add.blocks[0].terminator.ret_value(),
            Some(&Typed::new(Type::I32, Operand::local("sum")))
        );
    }

    #[test]
    fn test_round_trip_through_display() {
        let module = parse_module(ADD, "fallback").unwrap();
        let printed = module.to_string();
        let reparsed = parse_module(&printed, "fallback").unwrap();
        assert_eq!(module, reparsed);
    }

    #[test]
    fn test_parse_types() {
        assert_eq!(parse_type("double*").unwrap(), Type::Double.ptr_to());
        assert_eq!(parse_type("i8**").unwrap(), Type::I8.ptr_to().ptr_to());
        assert_eq!(
            parse_type("[3 x i32]").unwrap(),
            Type::Array(3, Box::new(Type::I32))
        );
        assert_eq!(
            parse_type("<4 x float>").unwrap(),
            Type::Vector(4, Box::new(Type::Float))
        );
        assert_eq!(parse_type("{}*").unwrap(), Type::Struct(Vec::new()).ptr_to());
        assert!(parse_type("i0").is_err());
        assert!(parse_type("quad").is_err());
    }

    #[test]
    fn test_parse_globals_and_declarations() {
        let text = r#"
@.str = internal constant c"..f:::ENTER\00"
@q = internal constant c"say \22hi\22"
@counter = global i32 7
declare void @hook(i32, ...)
declare double @sqrt(double %x)
"#;
        let module = parse_module(text, "m").unwrap();
        assert_eq!(module.name, "m");
        assert_eq!(module.global(".str").unwrap().as_c_string(), Some("..f:::ENTER"));
        assert_eq!(module.global("q").unwrap().as_c_string(), Some("say \"hi\""));
        assert_eq!(
            module.global("counter").unwrap().init,
            Constant::Int(Type::I32, 7)
        );
        let hook = module.function("hook").unwrap();
        assert!(hook.is_declaration());
        assert!(hook.variadic);
        assert_eq!(hook.params.len(), 1);
    }

    #[test]
    fn test_parse_branches_and_calls() {
        let text = r"
define double @pick(i32 %a, double %x) {
entry:
  %c = icmp slt i32 %a, 0
  br i1 %c, label %neg, label %pos
neg:
  %y = fmul double %x, -1.5
  ret double %y
pos:
  %z = call double @pick(i32 -1, double %x)
  ret double %z
}
";
        let module = parse_module(text, "m").unwrap();
        let pick = module.function("pick").unwrap();
        assert_eq!(pick.blocks.len(), 3);
        assert_eq!(pick.return_blocks(), vec![1, 2]);
        let InstrKind::Binary { rhs, .. } = &pick.blocks[1].instructions[0].kind else {
            panic!("expected binary op");
        };
        assert_eq!(rhs, &Operand::ConstFloat(-1.5));
        assert_eq!(pick.blocks[2].instructions[0].callee(), Some("pick"));
    }

    #[test]
    fn test_parse_casts() {
        let text = r"
define void @widen(i32 %a, float %k) {
entry:
  %w = sext i32 %a to i64
  %d = fpext float %k to double
  ret void
}
";
        let module = parse_module(text, "m").unwrap();
        let body = &module.function("widen").unwrap().blocks[0].instructions;
        assert_eq!(
            body[0].kind,
            InstrKind::Cast {
                op: CastOp::SExt,
                value: Typed::new(Type::I32, Operand::local("a")),
                to: Type::I64,
            }
        );
        assert_eq!(body[1].result_type(), Type::Double);
        assert_eq!(body[1].to_string(), "%d = fpext float %k to double");
        assert_eq!(parse_module(&module.to_string(), "m").unwrap(), module);
        assert!(parse_module("define void @f(i32 %a) {\nentry:\n  %w = sext i32 %a i64\n  ret void\n}\n", "m").is_err());
    }

    #[test]
    fn test_missing_terminator_is_an_error() {
        let text = "define void @f() {\nentry:\n  %x = alloca i32\n}\n";
        let err = parse_module(text, "m").unwrap_err();
        assert!(matches!(err, ParseError::MissingTerminator { .. }));
    }

    #[test]
    fn test_unterminated_body_is_an_error() {
        let text = "define void @f() {\nentry:\n  ret void\n";
        let err = parse_module(text, "m").unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedBody { .. }));
    }

    #[test]
    fn test_comment_inside_string_is_kept() {
        let text = "@s = internal constant c\"a;b\" ; trailing\n";
        let module = parse_module(text, "m").unwrap();
        assert_eq!(module.global("s").unwrap().as_c_string(), Some("a;b"));
    }
}
