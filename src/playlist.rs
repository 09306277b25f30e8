use crate::control::ControlStore;
use crate::library::VideoLibrary;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Playback ordering policy. The panel writes one of these tokens to the
/// mode file; the selector reads it back before every rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingMode {
    #[default]
    Random,
    Alphabetical,
    Custom,
    ListThenRandom,
}

impl OrderingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderingMode::Random => "random",
            OrderingMode::Alphabetical => "alphabetical",
            OrderingMode::Custom => "custom",
            OrderingMode::ListThenRandom => "list_then_random",
        }
    }

    /// Total parse for the file-read boundary: anything unknown is the
    /// default mode. The HTTP boundary uses the strict `FromStr`/serde
    /// parse instead and rejects unknown tokens.
    pub fn parse_lossy(token: &str) -> Self {
        token.parse().unwrap_or_default()
    }
}

impl FromStr for OrderingMode {
    type Err = anyhow::Error;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "random" => Ok(OrderingMode::Random),
            "alphabetical" => Ok(OrderingMode::Alphabetical),
            "custom" => Ok(OrderingMode::Custom),
            "list_then_random" => Ok(OrderingMode::ListThenRandom),
            other => Err(anyhow::anyhow!("Unknown ordering mode: {other:?}")),
        }
    }
}

/// Order the normal-library names according to `mode`. The output is always
/// a permutation of `names`: every video exactly once, nothing added.
///
/// `custom_order` and `priority` are consulted only by their respective
/// modes; entries naming videos that are not in `names` are skipped, and a
/// repeated entry counts once.
pub fn order(
    mode: OrderingMode,
    mut names: Vec<String>,
    custom_order: &[String],
    priority: &[String],
    rng: &mut fastrand::Rng,
) -> Vec<String> {
    match mode {
        OrderingMode::Random => {
            rng.shuffle(&mut names);
            names
        }
        OrderingMode::Alphabetical => {
            names.sort_by_key(|name| name.to_lowercase());
            names
        }
        OrderingMode::Custom => {
            // Rank by first occurrence in the list; anything unlisted sits
            // at "end of list" and keeps its natural order (stable sort).
            let mut ranks: HashMap<&str, usize> = HashMap::new();
            for (index, name) in custom_order.iter().enumerate() {
                ranks.entry(name.as_str()).or_insert(index);
            }
            let end = custom_order.len();
            names.sort_by_key(|name| ranks.get(name.as_str()).copied().unwrap_or(end));
            names
        }
        OrderingMode::ListThenRandom => {
            let mut listed = Vec::new();
            for wanted in priority {
                if let Some(position) = names.iter().position(|name| name == wanted) {
                    listed.push(names.swap_remove(position));
                }
            }
            rng.shuffle(&mut names);
            listed.extend(names);
            listed
        }
    }
}

/// Binds the control store and the normal library into the "give me the
/// next rotation" call the playout loop makes. Mode and auxiliary lists are
/// re-read on every invocation so panel edits take effect at the next
/// rotation without coordination.
#[derive(Debug)]
pub struct PlaylistSelector {
    control: ControlStore,
    library: VideoLibrary,
    rng: fastrand::Rng,
}

impl PlaylistSelector {
    pub fn new(control: ControlStore, library: VideoLibrary) -> Self {
        Self {
            control,
            library,
            rng: fastrand::Rng::new(),
        }
    }

    /// A fresh ordered sequence over the current normal library. Empty when
    /// the library is empty; the caller idles and retries.
    pub fn next_sequence(&mut self) -> Vec<String> {
        let names = self.library.normal_names();
        let mode = self.control.ordering_mode();
        order(
            mode,
            names,
            &self.control.custom_order(),
            &self.control.priority_list(),
            &mut self.rng,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn as_set(list: &[String]) -> BTreeSet<&str> {
        list.iter().map(String::as_str).collect()
    }

    #[test]
    fn mode_tokens_round_trip() {
        for mode in [
            OrderingMode::Random,
            OrderingMode::Alphabetical,
            OrderingMode::Custom,
            OrderingMode::ListThenRandom,
        ] {
            assert_eq!(OrderingMode::parse_lossy(mode.as_str()), mode);
            assert_eq!(mode.as_str().parse::<OrderingMode>().unwrap(), mode);
        }
    }

    #[test]
    fn unknown_mode_normalizes_on_read_and_fails_strict_parse() {
        assert_eq!(OrderingMode::parse_lossy("shuffled"), OrderingMode::Random);
        assert_eq!(OrderingMode::parse_lossy(""), OrderingMode::Random);
        assert!("shuffled".parse::<OrderingMode>().is_err());
    }

    #[test]
    fn every_mode_yields_a_permutation() {
        let library = names(&["d.mp4", "a.mp4", "c.mp4", "b.mp4"]);
        let custom = names(&["b.mp4", "zz.mp4"]);
        let priority = names(&["c.mp4"]);
        let mut rng = fastrand::Rng::with_seed(7);

        for mode in [
            OrderingMode::Random,
            OrderingMode::Alphabetical,
            OrderingMode::Custom,
            OrderingMode::ListThenRandom,
        ] {
            let sequence = order(mode, library.clone(), &custom, &priority, &mut rng);
            assert_eq!(sequence.len(), library.len(), "{mode:?}");
            assert_eq!(as_set(&sequence), as_set(&library), "{mode:?}");
        }
    }

    #[test]
    fn alphabetical_is_case_insensitive() {
        let mut rng = fastrand::Rng::with_seed(0);
        let sequence = order(
            OrderingMode::Alphabetical,
            names(&["b.mp4", "A.mp4", "c.mp4"]),
            &[],
            &[],
            &mut rng,
        );
        assert_eq!(sequence, names(&["A.mp4", "b.mp4", "c.mp4"]));
    }

    #[test]
    fn alphabetical_scenario() {
        let mut rng = fastrand::Rng::with_seed(0);
        let sequence = order(
            OrderingMode::Alphabetical,
            names(&["c.mp4", "a.mp4", "b.mp4"]),
            &[],
            &[],
            &mut rng,
        );
        assert_eq!(sequence, names(&["a.mp4", "b.mp4", "c.mp4"]));
    }

    #[test]
    fn custom_listed_first_then_rest_in_natural_order() {
        let mut rng = fastrand::Rng::with_seed(0);
        let library = names(&["a.mp4", "b.mp4", "c.mp4", "d.mp4"]);
        let custom = names(&["c.mp4", "missing.mp4", "a.mp4"]);

        let sequence = order(OrderingMode::Custom, library, &custom, &[], &mut rng);
        // Listed members in list order, the rest appended in input order
        assert_eq!(sequence, names(&["c.mp4", "a.mp4", "b.mp4", "d.mp4"]));
    }

    #[test]
    fn custom_without_a_list_keeps_natural_order() {
        let mut rng = fastrand::Rng::with_seed(0);
        let library = names(&["b.mp4", "a.mp4", "c.mp4"]);
        let sequence = order(OrderingMode::Custom, library.clone(), &[], &[], &mut rng);
        assert_eq!(sequence, library);
    }

    #[test]
    fn list_then_random_scenario() {
        let mut rng = fastrand::Rng::with_seed(3);
        let sequence = order(
            OrderingMode::ListThenRandom,
            names(&["a.mp4", "b.mp4"]),
            &[],
            &names(&["b.mp4", "z.mp4"]),
            &mut rng,
        );
        // z.mp4 does not exist and is skipped; only a.mp4 remains to append
        assert_eq!(sequence, names(&["b.mp4", "a.mp4"]));
    }

    #[test]
    fn list_then_random_prefix_is_deterministic() {
        let library = names(&["a.mp4", "b.mp4", "c.mp4", "d.mp4", "e.mp4"]);
        let priority = names(&["d.mp4", "b.mp4"]);

        let mut first_rng = fastrand::Rng::with_seed(1);
        let mut second_rng = fastrand::Rng::with_seed(99);
        let first = order(
            OrderingMode::ListThenRandom,
            library.clone(),
            &[],
            &priority,
            &mut first_rng,
        );
        let second = order(
            OrderingMode::ListThenRandom,
            library.clone(),
            &[],
            &priority,
            &mut second_rng,
        );

        assert_eq!(&first[..2], &names(&["d.mp4", "b.mp4"])[..]);
        assert_eq!(&second[..2], &names(&["d.mp4", "b.mp4"])[..]);
        // Tail is a permutation of the rest regardless of the shuffle
        assert_eq!(as_set(&first[2..]), as_set(&names(&["a.mp4", "c.mp4", "e.mp4"])));
    }

    #[test]
    fn list_then_random_collapses_duplicate_entries() {
        let mut rng = fastrand::Rng::with_seed(5);
        let sequence = order(
            OrderingMode::ListThenRandom,
            names(&["a.mp4", "b.mp4", "c.mp4"]),
            &[],
            &names(&["b.mp4", "b.mp4"]),
            &mut rng,
        );
        assert_eq!(sequence.len(), 3);
        assert_eq!(sequence[0], "b.mp4");
        assert_eq!(
            as_set(&sequence),
            as_set(&names(&["a.mp4", "b.mp4", "c.mp4"]))
        );
    }

    #[test]
    fn random_is_reproducible_per_seed() {
        let library = names(&["a.mp4", "b.mp4", "c.mp4", "d.mp4"]);
        let mut one = fastrand::Rng::with_seed(42);
        let mut two = fastrand::Rng::with_seed(42);
        assert_eq!(
            order(OrderingMode::Random, library.clone(), &[], &[], &mut one),
            order(OrderingMode::Random, library.clone(), &[], &[], &mut two),
        );
    }

    #[test]
    fn empty_library_yields_empty_sequence() {
        let mut rng = fastrand::Rng::with_seed(0);
        for mode in [
            OrderingMode::Random,
            OrderingMode::Alphabetical,
            OrderingMode::Custom,
            OrderingMode::ListThenRandom,
        ] {
            assert!(order(mode, Vec::new(), &[], &[], &mut rng).is_empty());
        }
    }
}
