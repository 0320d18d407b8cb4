/// Split a comma-delimited food description into its canonical name and the
/// observations line stored on the variation.
///
/// `"Arroz, integral, cozido"` becomes `("Arroz", "integral, cozido")`. The
/// abbreviations `s/` and `c/` are expanded to "without" and "with" in every
/// observation segment. When there is nothing after the
/// first comma the observations line is the name itself, so the variation row
/// ends up with the same text as its food.
#[must_use]
pub fn split_description(description: &str) -> (String, String) {
    let mut parts = description.split(',');
    let main_part = parts.next().unwrap_or_default().trim().to_string();

    let observations: Vec<String> = parts.map(expand_abbreviations).collect();

    let observations_line = if observations.is_empty() {
        main_part.clone()
    } else {
        observations.join(", ")
    };

    (main_part, observations_line)
}

fn expand_abbreviations(segment: &str) -> String {
    segment.trim().replace("s/", "without").replace("c/", "with")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_without_comma() {
        let (main, obs) = split_description("  Abacate  ");
        assert_eq!(main, "Abacate");
        assert_eq!(obs, "Abacate");
    }

    #[test]
    fn test_split_multiple_segments() {
        let (main, obs) = split_description("Arroz, integral, cozido");
        assert_eq!(main, "Arroz");
        assert_eq!(obs, "integral, cozido");
    }

    #[test]
    fn test_split_expands_abbreviations_per_segment() {
        let (main, obs) = split_description("Frango, peito, s/ pele, c/ sal");
        assert_eq!(main, "Frango");
        assert_eq!(obs, "peito, without pele, with sal");
    }

    #[test]
    fn test_split_expands_every_occurrence_in_a_segment() {
        let (_, obs) = split_description("Frango, s/ pele, c/ sal");
        assert_eq!(obs, "without pele, with sal");
        let (_, obs) = split_description("Batata, c/ casca e s/ sal c/ óleo");
        assert_eq!(obs, "with casca e without sal with óleo");
    }

    #[test]
    fn test_abbreviations_in_main_part_are_kept() {
        // Only observation segments are expanded.
        let (main, obs) = split_description("Pão c/ manteiga");
        assert_eq!(main, "Pão c/ manteiga");
        assert_eq!(obs, "Pão c/ manteiga");
    }

    #[test]
    fn test_split_trailing_comma_yields_empty_observation() {
        let (main, obs) = split_description("Feijão,");
        assert_eq!(main, "Feijão");
        assert_eq!(obs, "");
    }

    #[test]
    fn test_split_empty_description() {
        let (main, obs) = split_description("");
        assert_eq!(main, "");
        assert_eq!(obs, "");
    }
}
