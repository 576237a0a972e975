use crate::language::{
    span::Span,
    token::{Token, TokenKind},
};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char, digit0, digit1, satisfy},
    combinator::{opt, recognize},
    sequence::{delimited, pair},
    IResult, Parser as NomParser,
};

#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut remaining = source;
    let mut offset = 0usize;

    loop {
        let trimmed = skip_trivia(remaining);
        offset += remaining.len() - trimmed.len();
        remaining = trimmed;

        if remaining.is_empty() {
            break;
        }

        match scan_token(remaining) {
            Ok((rest, kind)) => {
                let consumed = remaining.len() - rest.len();
                tokens.push(Token {
                    kind,
                    span: Span::new(offset, offset + consumed),
                });
                remaining = rest;
                offset += consumed;
            }
            Err(_) => {
                let ch = remaining.chars().next().unwrap_or('\u{fffd}');
                let consumed = ch.len_utf8();
                let message = if ch == '"' || ch == '\'' || ch == '[' {
                    "Unterminated string literal".to_string()
                } else {
                    format!("Unexpected character `{ch}`")
                };
                errors.push(LexError {
                    message,
                    span: Span::new(offset, offset + consumed),
                });
                remaining = &remaining[consumed..];
                offset += consumed;
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::new(offset, offset),
    });

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}

fn skip_trivia(input: &str) -> &str {
    let mut rest = input.trim_start();
    while let Some(comment) = rest.strip_prefix("--") {
        rest = match comment.find('\n') {
            Some(index) => &comment[index + 1..],
            None => "",
        };
        rest = rest.trim_start();
    }
    rest
}

fn scan_token(input: &str) -> IResult<&str, TokenKind> {
    alt((string_literal, number, name_or_keyword, symbol))(input)
}

fn string_literal(input: &str) -> IResult<&str, TokenKind> {
    let (rest, value) = alt((
        delimited(tag("[["), take_until("]]"), tag("]]")),
        delimited(char('"'), take_while(|c| c != '"' && c != '\n'), char('"')),
        delimited(char('\''), take_while(|c| c != '\'' && c != '\n'), char('\'')),
    ))(input)?;
    Ok((rest, TokenKind::Str(value.to_string())))
}

fn number(input: &str) -> IResult<&str, TokenKind> {
    let (rest, text) = recognize(pair(digit1, opt(pair(char('.'), digit0))))(input)?;
    Ok((
        rest,
        TokenKind::Number {
            text: text.to_string(),
            float: text.contains('.'),
        },
    ))
}

fn name_or_keyword(input: &str) -> IResult<&str, TokenKind> {
    let (rest, text) = recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)?;
    let kind = match text {
        "nil" => TokenKind::Nil,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "local" => TokenKind::Local,
        "function" => TokenKind::Function,
        "if" => TokenKind::If,
        "then" => TokenKind::Then,
        "elseif" => TokenKind::Elseif,
        "else" => TokenKind::Else,
        "end" => TokenKind::End,
        other => TokenKind::Name(other.to_string()),
    };
    Ok((rest, kind))
}

fn symbol(input: &str) -> IResult<&str, TokenKind> {
    alt((
        tag("==").map(|_| TokenKind::EqEq),
        tag("~=").map(|_| TokenKind::NotEq),
        tag(">=").map(|_| TokenKind::GtEq),
        tag("<=").map(|_| TokenKind::LtEq),
        tag(">").map(|_| TokenKind::Gt),
        tag("<").map(|_| TokenKind::Lt),
        tag("=").map(|_| TokenKind::Assign),
        tag("+").map(|_| TokenKind::Plus),
        tag("-").map(|_| TokenKind::Minus),
        tag("*").map(|_| TokenKind::Star),
        tag("/").map(|_| TokenKind::Slash),
        tag(",").map(|_| TokenKind::Comma),
        tag(".").map(|_| TokenKind::Dot),
        tag(":").map(|_| TokenKind::Colon),
        tag("(").map(|_| TokenKind::LParen),
        tag(")").map(|_| TokenKind::RParen),
        tag(";").map(|_| TokenKind::Semi),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_numbers_with_distinct_kinds() {
        assert_eq!(
            kinds("1 2.5 3."),
            vec![
                TokenKind::Number {
                    text: "1".into(),
                    float: false
                },
                TokenKind::Number {
                    text: "2.5".into(),
                    float: true
                },
                TokenKind::Number {
                    text: "3.".into(),
                    float: true
                },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_strings_in_all_quote_styles() {
        assert_eq!(
            kinds("\"a\" 'b' [[c]]"),
            vec![
                TokenKind::Str("a".into()),
                TokenKind::Str("b".into()),
                TokenKind::Str("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_not_names() {
        assert_eq!(
            kinds("not nothing"),
            vec![
                TokenKind::Not,
                TokenKind::Name("nothing".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn skips_line_comments() {
        assert_eq!(
            kinds("x -- trailing\n-- full line\ny"),
            vec![
                TokenKind::Name("x".into()),
                TokenKind::Name("y".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn method_colon_and_member_dot() {
        assert_eq!(
            kinds("a.b:c"),
            vec![
                TokenKind::Name("a".into()),
                TokenKind::Dot,
                TokenKind::Name("b".into()),
                TokenKind::Colon,
                TokenKind::Name("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let errors = lex("\"oops").expect_err("should fail");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Unterminated"));
    }

    #[test]
    fn spans_track_byte_offsets() {
        let tokens = lex("ab  cd").expect("lex");
        assert_eq!(tokens[0].span, Span::new(0, 2));
        assert_eq!(tokens[1].span, Span::new(4, 6));
    }
}
