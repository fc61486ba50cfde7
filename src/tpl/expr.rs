use crate::config::MAX_NESTING_DEPTH;
use crate::data::value::Value;
use crate::error::TplError;
use crate::tpl::ast::{BinaryOp, Expr, LogicalOp, Path};

/// 解析表达式。
///
/// The operator class is chosen in a fixed order so the syntax stays
/// unambiguous: ternary, logical (`||`, `&&`, `!`), comparison, filter
/// pipeline, bare value. Every split only looks at characters outside
/// quoted strings.
pub fn parse_expression(expr: &str) -> Result<Expr, TplError> {
    parse_nested(expr, 0)
}

fn nesting_exceeded() -> TplError {
    TplError::syntax("maximum nesting depth exceeded")
}

fn parse_nested(expr: &str, depth: usize) -> Result<Expr, TplError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(nesting_exceeded());
    }
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(TplError::syntax("empty expression"));
    }

    if top_level_separators(expr, &['?']).next().is_some() {
        return parse_conditional(expr, depth);
    }

    if let Some(logical) = parse_logical(expr, depth)? {
        return Ok(logical);
    }

    if let Some((pos, op)) = find_comparison(expr) {
        let left = &expr[..pos];
        let right = &expr[pos + op.as_str().len()..];
        if left.trim().is_empty() || right.trim().is_empty() {
            return Err(TplError::syntax(format!("invalid binary expression: {}", expr)));
        }
        return Ok(Expr::Binary {
            op,
            left: Box::new(parse_nested(left, depth + 1)?),
            right: Box::new(parse_nested(right, depth + 1)?),
        });
    }

    if top_level_separators(expr, &['|']).next().is_some() {
        return parse_filter(expr);
    }

    parse_value(expr)
}

fn parse_conditional(expr: &str, depth: usize) -> Result<Expr, TplError> {
    let separators: Vec<(usize, char)> = top_level_separators(expr, &['?', ':']).collect();
    let &[(q, '?'), (c, ':')] = separators.as_slice() else {
        return Err(TplError::syntax(format!(
            "invalid conditional expression: {}",
            expr
        )));
    };

    let parts = [&expr[..q], &expr[q + 1..c], &expr[c + 1..]];
    if parts.iter().any(|p| p.trim().is_empty()) {
        return Err(TplError::syntax(format!(
            "invalid conditional expression: {}",
            expr
        )));
    }

    Ok(Expr::Conditional {
        test: Box::new(parse_nested(parts[0], depth + 1)?),
        consequent: Box::new(parse_nested(parts[1], depth + 1)?),
        alternate: Box::new(parse_nested(parts[2], depth + 1)?),
    })
}

/// `||` 优先级最低，其次 `&&`，一元 `!` 最高；同级左结合
fn parse_logical(expr: &str, depth: usize) -> Result<Option<Expr>, TplError> {
    for (token, op) in [("||", LogicalOp::Or), ("&&", LogicalOp::And)] {
        let parts = split_top_level(expr, token);
        if parts.len() < 2 {
            continue;
        }
        // the fold below nests one level per operand
        if depth + parts.len() > MAX_NESTING_DEPTH {
            return Err(nesting_exceeded());
        }

        let mut operands = parts.into_iter().map(|part| {
            if part.trim().is_empty() {
                Err(TplError::syntax(format!("invalid logical expression: {}", expr)))
            } else {
                parse_nested(part, depth + 1)
            }
        });
        let mut folded = match operands.next() {
            Some(first) => first?,
            None => return Ok(None),
        };
        for right in operands {
            folded = Expr::Logical {
                op,
                left: Box::new(folded),
                right: Box::new(right?),
            };
        }
        return Ok(Some(folded));
    }

    if let Some(rest) = expr.strip_prefix('!') {
        if !rest.starts_with('=') {
            if rest.trim().is_empty() {
                return Err(TplError::syntax(format!("invalid logical expression: {}", expr)));
            }
            return Ok(Some(Expr::Not(Box::new(parse_nested(rest, depth + 1)?))));
        }
    }

    Ok(None)
}

/// 按位置找到第一个比较运算符，双字符运算符优先
fn find_comparison(expr: &str) -> Option<(usize, BinaryOp)> {
    for (i, c) in unquoted(expr) {
        let rest = &expr[i..];
        let op = if rest.starts_with("==") {
            BinaryOp::Eq
        } else if rest.starts_with("!=") {
            BinaryOp::Ne
        } else if rest.starts_with(">=") {
            BinaryOp::Ge
        } else if rest.starts_with("<=") {
            BinaryOp::Le
        } else if c == '>' {
            BinaryOp::Gt
        } else if c == '<' {
            BinaryOp::Lt
        } else {
            continue;
        };
        return Some((i, op));
    }
    None
}

fn parse_filter(expr: &str) -> Result<Expr, TplError> {
    let mut parts = split_top_level(expr, "|").into_iter();
    let base = parse_value(parts.next().unwrap_or_default())?;
    let filters = parts
        .map(|part| {
            let name = part.trim();
            if is_identifier(name) {
                Ok(name.to_string())
            } else {
                Err(TplError::syntax(format!("invalid filter name: {}", name)))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Expr::Filter {
        base: Box::new(base),
        filters,
    })
}

/// 解析单个值：字面量、数字、方括号访问或点号路径
pub fn parse_value(raw: &str) -> Result<Expr, TplError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(TplError::syntax("empty expression"));
    }

    if let Some(text) = parse_quoted(s) {
        return Ok(Expr::Literal(Value::Str(text)));
    }

    match s {
        "null" => return Ok(Expr::Literal(Value::Null)),
        "undefined" => return Ok(Expr::Literal(Value::Undefined)),
        "true" => return Ok(Expr::Literal(Value::Bool(true))),
        "false" => return Ok(Expr::Literal(Value::Bool(false))),
        _ => {}
    }

    if is_numeric(s) {
        return parse_number(s).map(Expr::Literal);
    }

    if s.starts_with('[') || s.starts_with('{') {
        return Err(TplError::syntax(format!(
            "composite literals are not supported: {}",
            s
        )));
    }
    for (_, c) in unquoted(s) {
        if matches!(c, '+' | '-' | '*' | '/' | '%') {
            return Err(TplError::syntax(format!(
                "arithmetic operations are not supported: {}",
                s
            )));
        }
        if matches!(c, '{' | '}' | ',') {
            return Err(TplError::syntax(format!(
                "composite literals are not supported: {}",
                s
            )));
        }
    }

    if s.contains('[') {
        return parse_bracket_path(s);
    }
    parse_dot_path(s)
}

fn parse_bracket_path(s: &str) -> Result<Expr, TplError> {
    let open = s.find('[').unwrap_or(s.len());
    let root = &s[..open];
    if root.contains('.') {
        return Err(mixed_access(s));
    }
    if !is_identifier(root) {
        return Err(TplError::syntax(format!("invalid variable name: {}", s)));
    }

    let mut keys = Vec::new();
    let mut rest = &s[open..];
    while !rest.is_empty() {
        if rest.starts_with('.') {
            return Err(mixed_access(s));
        }
        let close = match rest.strip_prefix('[') {
            Some(_) => top_level_separators(rest, &[']']).next().map(|(i, _)| i),
            None => None,
        }
        .ok_or_else(|| TplError::syntax(format!("invalid property access: {}", s)))?;

        let inner = rest[1..close].trim();
        let key = match parse_quoted(inner) {
            Some(key) => key,
            None if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit()) => {
                inner.to_string()
            }
            None => return Err(TplError::syntax(format!("invalid property access: {}", s))),
        };
        keys.push(key);
        rest = &rest[close + 1..];
    }

    Ok(Expr::Variable(Path::new(root, keys)))
}

fn parse_dot_path(s: &str) -> Result<Expr, TplError> {
    let mut segments = s.split('.');
    let root = segments.next().unwrap_or_default();
    let keys: Vec<String> = segments.map(str::to_string).collect();
    if !is_identifier(root) || !keys.iter().all(|k| is_identifier(k)) {
        return Err(TplError::syntax(format!("invalid variable name: {}", s)));
    }
    Ok(Expr::Variable(Path::new(root, keys)))
}

fn mixed_access(s: &str) -> TplError {
    TplError::syntax(format!(
        "mixing dot and bracket notation is not supported: {}",
        s
    ))
}

fn is_numeric(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    body.chars().any(|c| c.is_ascii_digit())
        && body.chars().all(|c| c.is_ascii_digit() || c == '.')
        && body.matches('.').count() <= 1
}

fn parse_number(s: &str) -> Result<Value, TplError> {
    if !s.contains('.') {
        if let Ok(i) = s.parse::<i64>() {
            return Ok(Value::Int(i));
        }
    }
    s.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| TplError::syntax(format!("invalid number: {}", s)))
}

/// 标识符：`[0-9a-zA-Z_$]+`
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// 整个表达式是一个带引号的字符串时返回其内容
pub fn parse_quoted(s: &str) -> Option<String> {
    match take_quoted(s) {
        Some((text, rest)) if rest.is_empty() => Some(text),
        _ => None,
    }
}

/// Reads a leading quoted string, returning its unescaped content and the remainder.
pub fn take_quoted(s: &str) -> Option<(String, &str)> {
    let quote = s.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let mut text = String::new();
    let mut escaped = false;
    for (i, c) in s.char_indices().skip(1) {
        if escaped {
            if !matches!(c, '"' | '\'' | '\\') {
                text.push('\\');
            }
            text.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Some((text, &s[i + 1..]));
        } else {
            text.push(c);
        }
    }
    None
}

/// 引号之外的字符及其字节下标
fn unquoted(expr: &str) -> impl Iterator<Item = (usize, char)> + '_ {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    expr.char_indices().filter(move |&(_, c)| match quote {
        Some(q) => {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            false
        }
        None if c == '"' || c == '\'' => {
            quote = Some(c);
            false
        }
        None => true,
    })
}

pub(crate) fn top_level_separators<'a>(
    expr: &'a str,
    set: &'a [char],
) -> impl Iterator<Item = (usize, char)> + 'a {
    unquoted(expr).filter(move |(_, c)| set.contains(c))
}

/// 在引号之外按分隔符切分
pub(crate) fn split_top_level<'a>(expr: &'a str, sep: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut last = 0;
    for (i, _) in unquoted(expr) {
        if i >= last && expr[i..].starts_with(sep) {
            parts.push(&expr[last..i]);
            last = i + sep.len();
        }
    }
    parts.push(&expr[last..]);
    parts
}
