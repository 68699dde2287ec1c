use logos::Logos;

/// Tokens for the operand list of a CLSF record (everything after the `/`).
/// Keywords are split off by the parser before lexing, so only operand
/// shapes live here.

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f\r]+")] // Skip whitespace
#[logos(error = LexerError)]
pub enum Token {
    // Literals
    #[regex(r"[-+]?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(Option<f64>),

    // Bare words: tool names, units, modifiers (MILL, IPM, TOOL, BALL_MILL)
    #[regex(r"[A-Za-z_][A-Za-z0-9_.\-]*", |lex| lex.slice().to_string())]
    Word(String),

    // Punctuation
    #[token(",")]
    Comma,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LexerError;

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lexer error")
    }
}

impl std::error::Error for LexerError {}

/// Lex an operand list into tokens.
///
/// Unlike a free-form source, an operand list has no recoverable junk: the
/// first unlexable span is returned as the error.
pub fn lex(input: &str) -> Result<Vec<(Token, logos::Span)>, logos::Span> {
    Token::lexer(input)
        .spanned()
        .map(|(result, span)| match result {
            Ok(token) => Ok((token, span)),
            Err(_) => Err(span),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        lex(input).expect("lex failed").into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_goto_operands() {
        assert_eq!(
            tokens("1.2500,-0.5000,.7500,0.0000,0.0000,1.0000"),
            vec![
                Token::Number(Some(1.25)),
                Token::Comma,
                Token::Number(Some(-0.5)),
                Token::Comma,
                Token::Number(Some(0.75)),
                Token::Comma,
                Token::Number(Some(0.0)),
                Token::Comma,
                Token::Number(Some(0.0)),
                Token::Comma,
                Token::Number(Some(1.0)),
            ]
        );
    }

    #[test]
    fn test_words_and_numbers() {
        assert_eq!(
            tokens("IPM, 10.0"),
            vec![
                Token::Word("IPM".to_string()),
                Token::Comma,
                Token::Number(Some(10.0)),
            ]
        );
        assert_eq!(
            tokens("CAVITY_MILL,TOOL,BALL_MILL"),
            vec![
                Token::Word("CAVITY_MILL".to_string()),
                Token::Comma,
                Token::Word("TOOL".to_string()),
                Token::Comma,
                Token::Word("BALL_MILL".to_string()),
            ]
        );
    }

    #[test]
    fn test_exponent() {
        assert_eq!(tokens("1.5E-3"), vec![Token::Number(Some(0.0015))]);
    }

    #[test]
    fn test_unlexable_character() {
        let err = lex("1.0,#2").unwrap_err();
        assert_eq!(err, 4..5);
    }
}
