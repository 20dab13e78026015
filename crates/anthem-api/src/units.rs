// Unit conversions for display. The API itself always speaks Celsius and
// percent; account preferences only affect presentation.

/// Liters per US gallon.
pub const LITERS_PER_GALLON: f64 = 3.785_41;

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

pub fn gallons_to_liters(gallons: f64) -> f64 {
    gallons * LITERS_PER_GALLON
}

pub fn liters_to_gallons(liters: f64) -> f64 {
    liters / LITERS_PER_GALLON
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn temperature_fixed_points() {
        assert!(close(celsius_to_fahrenheit(0.0), 32.0));
        assert!(close(celsius_to_fahrenheit(100.0), 212.0));
        assert!(close(fahrenheit_to_celsius(98.6), 37.0));
        assert!(close(fahrenheit_to_celsius(-40.0), -40.0));
    }

    #[test]
    fn volume_conversion_is_symmetric() {
        assert!(close(gallons_to_liters(1.0), LITERS_PER_GALLON));
        assert!(close(liters_to_gallons(gallons_to_liters(12.5)), 12.5));
    }
}
