use logos::Logos;

use crate::error::{SchemeError, SchemeResult};


#[derive(Debug, Logos)]
#[logos(skip r"([ \t\r\n\f]+|;[^\n]*)")]
enum Token<'a> {
    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token("'")]
    Quote,

    #[regex(r#""([^"\\]|\\.)*""#, |lex| lex.slice())]
    String(&'a str),

    #[regex(r#"[^ \t\r\n\f()'";]+"#, |lex| lex.slice())]
    Literal(&'a str),
}

/// The generic, un-analyzed parse of one form. A lone `.` symbol inside a
/// list marks dotted-pair notation; it only means something under `quote`.
#[derive(Debug, Clone, PartialEq)]
pub enum Syntax {
    Number(i64),
    Rational(i64, i64),
    String(String),
    True,
    False,
    Symbol(String),
    List(Vec<Syntax>),
}

impl Syntax {
    pub fn symbol(name: &str) -> Self {
        Self::Symbol(name.to_owned())
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_dot(&self) -> bool {
        self.as_symbol() == Some(".")
    }
}

type ParseResult<O> = Result<O, SchemeError>;


fn lexer<'a>(input: &'a str) -> ParseResult<Vec<Token<'a>>> {
    let mut tokens = vec![];
    let mut tokenizer = Token::lexer(input);

    while let Some(result) = tokenizer.next() {
        match result {
            Ok(token) => tokens.push(token),
            Err(_) => return Err(SchemeError::syntax(format!("unexpected input `{}`", tokenizer.slice()))),
        }
    }

    Ok(tokens)
}

fn parse_token<'a, 'b: 'a>(token_recognizer: impl Fn(&'a Token<'b>) -> bool) -> impl Fn(&'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], &'a Token<'b>)> {
    move |tokens| {
        let Some(token) = tokens.first() else {
            return Err(SchemeError::syntax("unexpected end of input"));
        };

        if !token_recognizer(token) { return Err(SchemeError::syntax(format!("unexpected token {:?}", token))); }
        Ok((&tokens[1..], token))
    }
}

fn parse_surrounds<'a, 'b: 'a, O>(
    start_recognizer: impl Fn(&'a Token<'b>) -> bool,
    internal_parser: impl Fn(&'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], O)>,
    end_recognizer: impl Fn(&'a Token<'b>) -> bool,
) -> impl Fn(&'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], O)> {
    let start_parser = parse_token(start_recognizer);
    let end_parser = parse_token(end_recognizer);

    move |tokens| {
        let (tokens, _) = start_parser(tokens)?;
        let (tokens, internal) = internal_parser(tokens)?;
        let (tokens, _) = end_parser(tokens)?;

        Ok((tokens, internal))
    }
}

fn parse_list<'a, 'b: 'a, O>(
    parser: impl Fn(&'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], O)>
) -> impl Fn(&'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], Vec<O>)> {
    move |mut tokens| {
        let mut result = vec![];

        while let Ok((new_tokens, value)) = parser(tokens) {
            result.push(value);
            tokens = new_tokens
        }

        Ok((tokens, result))
    }
}

fn parse_either<'a, 'b: 'a, O>(
    a: impl Fn(&'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], O)>,
    b: impl Fn(&'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], O)>,
) -> impl Fn(&'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], O)> {
    move |tokens| {
        if let Ok(a) = a(tokens) {
            return Ok(a)
        }
        b(tokens)
    }
}

fn parser_map<'a, 'b: 'a, I, O>(
    parser: impl Fn(&'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], I)>,
    f: impl Fn(I) -> O
) -> impl Fn(&'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], O)> {
    move |tokens| {
        let (tokens, value) = parser(tokens)?;
        Ok((tokens, f(value)))
    }
}

pub(crate) fn is_integer_literal(literal: &str) -> bool {
    let digits = literal.strip_prefix(['+', '-']).unwrap_or(literal);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn classify_literal(literal: &str) -> ParseResult<Syntax> {
    match literal {
        "#t" => return Ok(Syntax::True),
        "#f" => return Ok(Syntax::False),
        _ => {}
    }

    if is_integer_literal(literal) {
        // Digit strings too wide for a fixnum stay symbols; evaluating one
        // reports the overflow
        return Ok(match literal.parse() {
            Ok(number) => Syntax::Number(number),
            Err(_) => Syntax::symbol(literal),
        });
    }

    if let Some((numerator, denominator)) = literal.split_once('/') {
        if is_integer_literal(numerator) && !denominator.is_empty() && denominator.bytes().all(|b| b.is_ascii_digit()) {
            return match (numerator.parse(), denominator.parse::<i64>()) {
                (Ok(_), Ok(0)) => Err(SchemeError::syntax(format!("zero denominator in `{}`", literal))),
                (Ok(numerator), Ok(denominator)) => Ok(Syntax::Rational(numerator, denominator)),
                _ => Ok(Syntax::symbol(literal)),
            };
        }
    }

    Ok(Syntax::symbol(literal))
}

fn unescape(quoted: &str) -> String {
    let body = &quoted[1..quoted.len() - 1];
    let mut result = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some(other) => result.push(other),
            None => {}
        }
    }

    result
}

fn parse_atom<'a, 'b: 'a>(tokens: &'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], Syntax)> {
    let (tokens, literal) = parse_token(|token| matches!(token, Token::Literal(_) | Token::String(_)))(tokens)?;
    let syntax = match literal {
        Token::Literal(literal) => classify_literal(literal)?,
        Token::String(quoted) => Syntax::String(unescape(quoted)),
        _ => unreachable!("only literals and strings are recognized")
    };
    Ok((tokens, syntax))
}

fn parse_quoted<'a, 'b: 'a>(tokens: &'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], Syntax)> {
    let (tokens, _) = parse_token(|token| matches!(token, Token::Quote))(tokens)?;
    let (tokens, quoted) = parse_sexp(tokens)?;
    Ok((tokens, Syntax::List(vec![Syntax::symbol("quote"), quoted])))
}

fn parse_expression<'a, 'b: 'a>(tokens: &'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], Syntax)> {
    parse_surrounds(
        |token| matches!(token, Token::LeftParen),
        parser_map(
            parse_list(parse_sexp),
            Syntax::List
        ),
        |token| matches!(token, Token::RightParen)
    )(tokens)
}

fn parse_sexp<'a, 'b: 'a>(tokens: &'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], Syntax)> {
    parse_either(
        parse_atom,
        parse_either(parse_quoted, parse_expression)
    )(tokens)
}

/// Reads exactly one form from `input`.
pub fn parse(input: &str) -> SchemeResult<Syntax> {
    let tokens = lexer(input)?;

    let (tokens, syntax) = parse_sexp(&tokens)?;
    if !tokens.is_empty() { return Err(SchemeError::syntax("trailing input after the form")); }

    Ok(syntax)
}

/// Reads a whole program as a sequence of top-level forms.
pub fn parse_all(input: &str) -> SchemeResult<Vec<Syntax>> {
    let tokens = lexer(input)?;
    let mut remaining = tokens.as_slice();
    let mut forms = vec![];

    while !remaining.is_empty() {
        let (rest, syntax) = parse_sexp(remaining)?;
        forms.push(syntax);
        remaining = rest;
    }

    Ok(forms)
}

/// Whether `input` holds only complete forms, so a line-based reader knows
/// when to stop asking for more.
pub fn is_complete(input: &str) -> bool {
    let Ok(tokens) = lexer(input) else { return false };

    let mut depth = 0i64;
    for token in &tokens {
        match token {
            Token::LeftParen => depth += 1,
            Token::RightParen => depth -= 1,
            _ => {}
        }
    }

    depth <= 0 && !matches!(tokens.last(), Some(Token::Quote))
}
