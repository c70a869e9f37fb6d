#[cfg(test)]
mod load_shapes_tests {
    use approx::assert_abs_diff_eq;
    use std::collections::HashSet;

    use crate::config::ModelParameters;
    use crate::errors::ProjectionError;
    use crate::load_shapes::*;
    use crate::models::{days_of_year, Sector, TemperatureMultiplier};
    use crate::tests::test_helpers::test_helpers::*;
    use crate::weather::{calculate_degree_days, compute_temperature_multipliers, Smoother};

    fn multipliers_for(year: i32) -> Vec<TemperatureMultiplier> {
        let params = ModelParameters::default();
        let days = calculate_degree_days(&synthetic_weather(COUNTRY, year), &params);
        compute_temperature_multipliers(&Smoother::from_params(&params).smooth(&days))
    }

    #[test]
    fn test_expansion_covers_every_hour() {
        for (year, hours) in [(2018, 8760), (2020, 8784)] {
            let shapes = profile(COUNTRY, Sector::Residential, "heating", 2025);
            let profiles = RepresentativeProfiles::build(&shapes, &[2025]).unwrap();
            let rows = expand_load_shapes(&profiles, &multipliers_for(year), year).unwrap();

            assert_eq!(rows.len(), hours);
            let unique: HashSet<_> = rows.iter().map(|r| r.timestamp).collect();
            assert_eq!(unique.len(), hours);
            assert_eq!(days_of_year(year).len() * 24, hours);
        }
    }

    #[test]
    fn test_end_use_picks_its_multiplier() {
        let mut shapes = profile(COUNTRY, Sector::Residential, "heating", 2025);
        shapes.extend(profile(COUNTRY, Sector::Residential, "cooling", 2025));
        shapes.extend(profile(COUNTRY, Sector::Residential, "Heating", 2025));
        let multipliers = multipliers_for(WEATHER_YEAR);
        let profiles = RepresentativeProfiles::build(&shapes, &[2025]).unwrap();
        let rows = expand_load_shapes(&profiles, &multipliers, WEATHER_YEAR).unwrap();

        let january_first = &multipliers[0];
        let first_of = |end_use: &str| {
            rows.iter()
                .find(|r| r.end_use == end_use && r.timestamp.date() == january_first.date)
                .unwrap()
        };
        assert_eq!(first_of("heating").multiplier, january_first.heating_multiplier);
        assert_eq!(first_of("cooling").multiplier, january_first.cooling_multiplier);
        // classification is exact, so capitalised names fall through to "other"
        assert_eq!(first_of("Heating").multiplier, 1.0);

        for row in &rows {
            assert_abs_diff_eq!(row.adjusted_value, row.raw_value * row.multiplier, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_weekend_profile_used_on_saturday() {
        let mut shapes = profile(COUNTRY, Sector::Commercial, "other", 2025);
        for row in shapes.iter_mut() {
            if row.day_type == crate::models::DayType::Weekend {
                row.value = 42.0;
            }
        }
        let profiles = RepresentativeProfiles::build(&shapes, &[2025]).unwrap();
        let rows = expand_load_shapes(&profiles, &multipliers_for(WEATHER_YEAR), WEATHER_YEAR).unwrap();

        let saturday = date(2018, 1, 6);
        assert!(rows
            .iter()
            .filter(|r| r.timestamp.date() == saturday)
            .all(|r| r.raw_value == 42.0));
        let monday_noon = rows
            .iter()
            .find(|r| r.timestamp == date(2018, 1, 8).and_hms_opt(12, 0, 0).unwrap())
            .unwrap();
        assert_abs_diff_eq!(monday_noon.raw_value, 2.2, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_representative_hour_is_input_gap() {
        let shapes: Vec<_> = profile(COUNTRY, Sector::Residential, "other", 2025)
            .into_iter()
            .filter(|r| !(r.month == 3 && r.hour == 5))
            .collect();
        let profiles = RepresentativeProfiles::build(&shapes, &[2025]).unwrap();
        let result = expand_load_shapes(&profiles, &multipliers_for(WEATHER_YEAR), WEATHER_YEAR);

        assert!(matches!(result, Err(ProjectionError::InputGap { ref table, .. }) if table == "load_shapes"));
    }

    #[test]
    fn test_duplicate_representative_row_rejected() {
        let mut shapes = profile(COUNTRY, Sector::Residential, "other", 2025);
        shapes.push(shapes[10].clone());

        assert!(matches!(
            RepresentativeProfiles::build(&shapes, &[2025]),
            Err(ProjectionError::InvalidValue { ref table, .. }) if table == "load_shapes"
        ));
    }

    #[test]
    fn test_duplicate_multiplier_day_rejected() {
        let shapes = profile(COUNTRY, Sector::Residential, "heating", 2025);
        let profiles = RepresentativeProfiles::build(&shapes, &[2025]).unwrap();
        let mut multipliers = multipliers_for(WEATHER_YEAR);
        let mut repeated = multipliers[30].clone();
        repeated.heating_multiplier = 3.0;
        multipliers.push(repeated);

        let result = expand_load_shapes(&profiles, &multipliers, WEATHER_YEAR);
        assert!(matches!(
            result,
            Err(ProjectionError::InvalidValue { ref table, ref column, .. })
                if table == "temperature_multipliers" && column == "date"
        ));
    }

    #[test]
    fn test_missing_multiplier_day_is_input_gap() {
        let shapes = profile(COUNTRY, Sector::Residential, "other", 2025);
        let profiles = RepresentativeProfiles::build(&shapes, &[2025]).unwrap();
        let mut multipliers = multipliers_for(WEATHER_YEAR);
        multipliers.retain(|m| m.date != date(2018, 7, 4));

        let result = expand_load_shapes(&profiles, &multipliers, WEATHER_YEAR);
        assert!(matches!(result, Err(ProjectionError::InputGap { ref table, .. }) if table == "temperature_multipliers"));
    }

    #[test]
    fn test_unrequested_model_years_skipped() {
        let mut shapes = profile(COUNTRY, Sector::Residential, "other", 2025);
        shapes.extend(profile(COUNTRY, Sector::Residential, "other", 2040));
        let profiles = RepresentativeProfiles::build(&shapes, &[2025]).unwrap();

        assert_eq!(profiles.len(), 1);
        assert!(profiles.keys().all(|k| k.3 == 2025));
    }
}
