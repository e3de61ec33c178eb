use rand::Rng;

use crate::config::{EndpointGroup, ScenarioWeights};

/// Pick a target group uniformly at random. Every scenario execution draws independently so
/// load spreads evenly over the configured deployments.
pub fn select_group<'a, R: Rng>(targets: &'a [EndpointGroup], rng: &mut R) -> &'a EndpointGroup {
    &targets[rng.gen_range(0..targets.len())]
}

/// Pick a geohash candidate uniformly at random for the fetch flow.
pub fn select_geohash<'a, R: Rng>(candidates: &'a [String], rng: &mut R) -> &'a str {
    &candidates[rng.gen_range(0..candidates.len())]
}

/// Derive a stable user id in `1..=users` from a virtual client identity by rotation.
pub fn derive_user_id(client_index: usize, users: u32) -> u32 {
    (client_index as u32 % users) + 1
}

/// Weighted draw between the two flows of the combined scenario, true for upload. The weights
/// are summed as u64 so extreme configured values cannot overflow the draw range.
pub fn select_upload<R: Rng>(weights: ScenarioWeights, rng: &mut R) -> bool {
    let upload = weights.upload as u64;
    let fetch = weights.fetch as u64;
    rng.gen_range(0..upload + fetch) < upload
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use url::Url;

    fn targets(count: usize) -> Vec<EndpointGroup> {
        (0..count)
            .map(|i| EndpointGroup {
                name: format!("edge{i}"),
                api_base_url: Url::parse(&format!("http://api{i}:8000")).unwrap(),
                storage_base_url: Url::parse(&format!("http://store{i}:9000")).unwrap(),
            })
            .collect()
    }

    #[test]
    fn selection_is_roughly_uniform() {
        let targets = targets(4);
        let mut rng = StdRng::seed_from_u64(7);

        let mut counts = [0u32; 4];
        for _ in 0..10_000 {
            let group = select_group(&targets, &mut rng);
            let index = targets.iter().position(|t| t.name == group.name).unwrap();
            counts[index] += 1;
        }

        // Each group expects 2500 draws, allow a generous band for randomness.
        for count in counts {
            assert!((2000..=3000).contains(&count), "skewed selection: {counts:?}");
        }
    }

    #[test]
    fn selection_is_deterministic_for_a_fixed_seed() {
        let targets = targets(5);

        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..20)
                .map(|_| select_group(&targets, &mut rng).name.clone())
                .collect::<Vec<_>>()
        };

        assert_eq!(draw(42), draw(42));
    }

    #[test]
    fn single_target_is_always_selected() {
        let targets = targets(1);
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..100 {
            assert_eq!("edge0", select_group(&targets, &mut rng).name);
        }
    }

    #[test]
    fn user_ids_rotate_over_the_configured_range() {
        assert_eq!(1, derive_user_id(0, 3));
        assert_eq!(2, derive_user_id(1, 3));
        assert_eq!(3, derive_user_id(2, 3));
        assert_eq!(1, derive_user_id(3, 3));
        assert_eq!(1, derive_user_id(100, 1));
    }

    #[test]
    fn extreme_weights_do_not_overflow_the_draw() {
        let weights = ScenarioWeights {
            upload: u32::MAX,
            fetch: u32::MAX,
        };
        let mut rng = StdRng::seed_from_u64(11);

        let mut uploads = 0u32;
        for _ in 0..1000 {
            if select_upload(weights, &mut rng) {
                uploads += 1;
            }
        }

        // Equal weights should split the draws roughly in half.
        assert!((300..=700).contains(&uploads), "skewed draw: {uploads}");
    }

    #[test]
    fn zero_weight_flows_are_never_drawn() {
        let mut rng = StdRng::seed_from_u64(2);

        for _ in 0..100 {
            assert!(select_upload(
                ScenarioWeights {
                    upload: 1,
                    fetch: 0
                },
                &mut rng
            ));
            assert!(!select_upload(
                ScenarioWeights {
                    upload: 0,
                    fetch: 1
                },
                &mut rng
            ));
        }
    }

    #[test]
    fn geohash_selection_stays_within_the_candidates() {
        let candidates = vec!["xn1vqhzy".to_string(), "dummy111".to_string()];
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..100 {
            let geohash = select_geohash(&candidates, &mut rng);
            assert!(candidates.iter().any(|c| c == geohash));
        }
    }
}
