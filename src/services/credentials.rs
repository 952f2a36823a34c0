use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

const PASSWORD_LENGTH: usize = 8;

fn transliterate_char(c: char) -> Option<&'static str> {
    Some(match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' | 'ё' | 'э' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' | 'ы' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "kh",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    })
}

/// Lowercases and maps Cyrillic letters to Latin. Anything outside the table, including the
/// hard and soft signs, passes through unchanged.
pub(crate) fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.trim().chars().flat_map(char::to_lowercase) {
        match transliterate_char(c) {
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

fn initial(name: Option<&str>) -> String {
    name.and_then(|value| value.trim().chars().next())
        .map(|c| transliterate(&c.to_string()))
        .unwrap_or_default()
}

/// Base login: transliterated last name followed by first and middle initials,
/// e.g. `Иванов Пётр Сергеевич` gives `ivanovps`. Uniqueness is resolved by the caller.
pub(crate) fn generate_login(last_name: &str, first_name: &str, middle_name: Option<&str>) -> String {
    format!("{}{}{}", transliterate(last_name), initial(Some(first_name)), initial(middle_name))
}

pub(crate) fn generate_password() -> String {
    OsRng.sample_iter(&Alphanumeric).take(PASSWORD_LENGTH).map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyrillic_names_become_latin_logins() {
        assert_eq!(generate_login("Иванов", "Пётр", Some("Сергеевич")), "ivanovps");
        assert_eq!(generate_login("Щукина", "Юлия", None), "shchukinayu");
        assert_eq!(generate_login("Хаценко", "Жанна", Some("")), "khatsenkozh");
    }

    #[test]
    fn latin_names_are_lowercased_as_is() {
        assert_eq!(generate_login("Smith", "John", Some("Paul")), "smithjp");
        assert_eq!(transliterate("Подъезд"), "podъezd");
    }

    #[test]
    fn passwords_are_eight_alphanumerics() {
        let password = generate_password();
        assert_eq!(password.len(), 8);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(password, generate_password());
    }
}
