/// Normalizes a user-provided identifier into a config name.
///
/// Rules:
/// - letters are lowercased
/// - whitespace becomes `_`
/// - ASCII alphanumerics, `-` and `_` are kept
/// - common accented Latin letters are folded to their ASCII base
/// - anything else becomes `-`
pub fn protect_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_whitespace() {
            out.push('_');
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            out.push(c.to_ascii_lowercase());
        } else if let Some(folded) = fold_latin(c) {
            out.push(folded);
        } else {
            out.push('-');
        }
    }
    out
}

fn fold_latin(c: char) -> Option<char> {
    let folded = match c.to_lowercase().next().unwrap_or(c) {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    use super::protect_name;

    #[test]
    fn lowercases_and_replaces_whitespace() {
        assert_eq!(protect_name("My Data Node"), "my_data_node");
        assert_eq!(protect_name("Already_ok-1"), "already_ok-1");
    }

    #[test]
    fn folds_accented_letters() {
        assert_eq!(protect_name("prévision Été"), "prevision_ete");
    }

    #[test]
    fn replaces_punctuation_with_dash() {
        assert_eq!(protect_name("a.b/c"), "a-b-c");
    }
}
