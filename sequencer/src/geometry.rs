//! Declination-arc geometry
//!
//! Turns a target position and the configured arc options into the
//! measurement envelope handed to the tool: declination limits, arc offset
//! and the east/west hour-angle window.

use tracing::debug;

use crate::astro;
use crate::options::ModelToolOptions;

/// Declination limits are clamped to this band
const DEC_LIMIT: i32 = 85;

/// Derived measurement envelope for one dec-arc run.
///
/// Computed once per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DecArcParameters {
    /// Target declination rounded to the nearest degree
    pub target_dec: i32,
    pub north_dec_limit: i32,
    pub south_dec_limit: i32,
    /// Offset aligning the arc grid with the southern limit
    pub dec_offset: i32,
    pub arc_quantity: i32,
    pub dec_spacing: i32,
    pub ra_spacing: i32,
    /// Target's hour angle at calculation time
    pub target_ha: f64,
    /// Eastern edge of the measurement window, hours
    pub east_ha_limit: f64,
    /// Western edge of the measurement window, hours
    pub west_ha_limit: f64,
    /// Tool point-ordering strategy chosen for this run
    pub point_ordering_strategy: i32,
}

/// Compute the dec-arc envelope for a target.
///
/// `full_arc` widens the hour-angle window to the whole eastern horizon
/// instead of leading the target's current position.
///
/// The southern limit uses round-to-nearest on `dec - span/2`; limits are
/// clamped to ±85° and the caller rejects targets beyond that band before
/// calling here. A configured spacing below 1° is treated as 1°.
pub fn calculate_dec_arc(
    ra_hours: f64,
    dec_degrees: f64,
    lst_hours: f64,
    options: &ModelToolOptions,
    full_arc: bool,
) -> DecArcParameters {
    let target_ha = astro::hour_angle(lst_hours, ra_hours);

    let east_ha_limit = if full_arc {
        -12.0
    } else {
        let limit = (target_ha - options.hour_angle_lead_in).max(-12.0);
        (limit * 100.0).round() / 100.0
    };

    let target_dec = dec_degrees.round() as i32;

    let mut params = DecArcParameters {
        target_dec,
        north_dec_limit: target_dec,
        south_dec_limit: target_dec,
        dec_offset: 0,
        arc_quantity: options.dec_arc_quantity,
        dec_spacing: options.dec_arc_dec_spacing.max(1),
        ra_spacing: options.dec_arc_ra_spacing,
        target_ha,
        east_ha_limit,
        west_ha_limit: 12.0,
        point_ordering_strategy: options.point_ordering_strategy,
    };

    if params.arc_quantity == 1 {
        params.dec_spacing = 1;
    } else {
        let total_span = (params.arc_quantity - 1) * params.dec_spacing;
        params.south_dec_limit =
            (-DEC_LIMIT).max((dec_degrees - total_span as f64 / 2.0).round() as i32);
        params.north_dec_limit = DEC_LIMIT.min(params.south_dec_limit + total_span);
        params.dec_offset = params.south_dec_limit % params.dec_spacing;
    }

    // The pole-proximity test uses <= so a target exactly on the limit still
    // gets the polar ordering.
    if 90 - params.target_dec.abs() <= options.polar_proximity_limit {
        params.point_ordering_strategy = options.polar_point_ordering_strategy;
    }

    debug!(
        "Dec arc: T={} N={} S={} offset={} eastHA={:.2} ordering={}",
        params.target_dec,
        params.north_dec_limit,
        params.south_dec_limit,
        params.dec_offset,
        params.east_ha_limit,
        params.point_ordering_strategy
    );

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(quantity: i32, dec_spacing: i32) -> ModelToolOptions {
        ModelToolOptions {
            dec_arc_quantity: quantity,
            dec_arc_dec_spacing: dec_spacing,
            dec_arc_ra_spacing: 5,
            hour_angle_lead_in: 0.5,
            point_ordering_strategy: 0,
            polar_point_ordering_strategy: 2,
            polar_proximity_limit: 10,
            ..Default::default()
        }
    }

    #[test]
    fn worked_example_near_the_pole() {
        // Dec 80, 3 arcs of 5°: span 10 → south 75, north clamped to 85
        let params = calculate_dec_arc(0.0, 80.0, 0.0, &options(3, 5), false);
        assert_eq!(params.south_dec_limit, 75);
        assert_eq!(params.north_dec_limit, 85);
        assert_eq!(params.dec_offset, 0);
    }

    #[test]
    fn limits_ordered_and_clamped_for_many_inputs() {
        for &dec in &[-84.0, -60.0, -10.5, 0.0, 3.2, 45.0, 71.7, 84.0] {
            for quantity in 2..=7 {
                for spacing in 1..=10 {
                    let params =
                        calculate_dec_arc(6.0, dec, 0.0, &options(quantity, spacing), false);
                    assert!(
                        params.south_dec_limit <= params.north_dec_limit,
                        "dec {} quantity {} spacing {}",
                        dec,
                        quantity,
                        spacing
                    );
                    assert!(params.south_dec_limit >= -85);
                    assert!(params.north_dec_limit <= 85);
                }
            }
        }
    }

    #[test]
    fn single_arc_collapses_to_target() {
        let params = calculate_dec_arc(0.0, 42.4, 0.0, &options(1, 5), false);
        assert_eq!(params.dec_spacing, 1);
        assert_eq!(params.south_dec_limit, 42);
        assert_eq!(params.north_dec_limit, 42);
        assert_eq!(params.dec_offset, 0);
    }

    #[test]
    fn south_limit_rounds_to_nearest() {
        // Dec 40.6, span 5: 40.6 - 2.5 = 38.1 → 38
        let params = calculate_dec_arc(0.0, 40.6, 0.0, &options(2, 5), false);
        assert_eq!(params.south_dec_limit, 38);
        assert_eq!(params.north_dec_limit, 43);
        // Dec 40.9 - 2.5 = 38.4 → 38; dec 41.2 - 2.5 = 38.7 → 39
        assert_eq!(
            calculate_dec_arc(0.0, 41.2, 0.0, &options(2, 5), false).south_dec_limit,
            39
        );
    }

    #[test]
    fn offset_aligns_grid_with_south_limit() {
        // South limit 38 with spacing 5 → offset 3
        let params = calculate_dec_arc(0.0, 40.6, 0.0, &options(2, 5), false);
        assert_eq!(params.dec_offset, 38 % 5);

        // Negative south limit keeps the truncated remainder
        let southern = calculate_dec_arc(0.0, -40.6, 0.0, &options(2, 5), false);
        assert_eq!(southern.dec_offset, southern.south_dec_limit % 5);
    }

    #[test]
    fn east_limit_leads_current_hour_angle() {
        // LST 6h, RA 6h → HA 0; lead-in 0.5 → east limit -0.5
        let params = calculate_dec_arc(6.0, 20.0, 6.0, &options(3, 3), false);
        assert!((params.east_ha_limit - (-0.5)).abs() < 1e-9);
        assert_eq!(params.west_ha_limit, 12.0);
    }

    #[test]
    fn east_limit_rounds_to_two_decimals() {
        let mut opts = options(3, 3);
        opts.hour_angle_lead_in = 0.333;
        let params = calculate_dec_arc(6.0, 20.0, 6.0, &opts, false);
        assert_eq!(params.east_ha_limit, -0.33);
    }

    #[test]
    fn east_limit_never_below_minus_twelve() {
        let mut opts = options(3, 3);
        opts.hour_angle_lead_in = 5.0;
        // Target far east: HA near -11
        let params = calculate_dec_arc(17.0, 20.0, 6.0, &opts, false);
        assert_eq!(params.east_ha_limit, -12.0);
    }

    #[test]
    fn full_arc_opens_the_whole_east_side() {
        let params = calculate_dec_arc(6.0, 20.0, 6.0, &options(3, 3), true);
        assert_eq!(params.east_ha_limit, -12.0);
    }

    #[test]
    fn polar_ordering_selected_at_boundary() {
        // 90 - 81 = 9 <= 10 → polar strategy
        let params = calculate_dec_arc(0.0, 81.0, 0.0, &options(1, 1), false);
        assert_eq!(params.point_ordering_strategy, 2);

        // Exact equality: 90 - 80 = 10 <= 10 → still polar
        let boundary = calculate_dec_arc(0.0, 80.0, 0.0, &options(1, 1), false);
        assert_eq!(boundary.point_ordering_strategy, 2);

        // One degree further out: default strategy
        let ordinary = calculate_dec_arc(0.0, 79.0, 0.0, &options(1, 1), false);
        assert_eq!(ordinary.point_ordering_strategy, 0);

        // Southern pole counts the same way
        let southern = calculate_dec_arc(0.0, -81.0, 0.0, &options(1, 1), false);
        assert_eq!(southern.point_ordering_strategy, 2);
    }

    #[test]
    fn target_dec_rounds_to_nearest_degree() {
        assert_eq!(
            calculate_dec_arc(0.0, 41.5, 0.0, &options(1, 1), false).target_dec,
            42
        );
        assert_eq!(
            calculate_dec_arc(0.0, -41.5, 0.0, &options(1, 1), false).target_dec,
            -42
        );
    }
}
