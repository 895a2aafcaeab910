use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::models::{HelpSubject, TaskKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub from: String,
    pub to: String,
    pub distance_km: u32,
    pub duration: String,
    /// Trains running the route, or bus operators serving it.
    #[serde(default)]
    pub services: Vec<String>,
    /// Classes or bus types offered on the route.
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub code: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub fare_per_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusTypeInfo {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub best_for: String,
    pub fare_per_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorInfo {
    pub name: String,
    pub rating: f32,
    pub speciality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub name: String,
    pub website: String,
    pub helpline: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub tips: Vec<String>,
}

/// Advice lists for Tatkal quotas and long or overnight bus journeys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TravelTips {
    #[serde(default)]
    pub tatkal: Vec<String>,
    #[serde(default)]
    pub premium_tatkal: Vec<String>,
    #[serde(default)]
    pub overnight: Vec<String>,
    #[serde(default)]
    pub long_distance: Vec<String>,
}

/// Static lookup tables used when finalizing a booking request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    #[serde(default)]
    pub train_routes: Vec<RouteInfo>,
    #[serde(default)]
    pub bus_routes: Vec<RouteInfo>,
    #[serde(default)]
    pub train_classes: Vec<ClassInfo>,
    #[serde(default)]
    pub bus_types: Vec<BusTypeInfo>,
    #[serde(default)]
    pub operators: Vec<OperatorInfo>,
    pub train_platform: PlatformInfo,
    pub bus_platform: PlatformInfo,
    #[serde(default)]
    pub travel_tips: TravelTips,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::builtin()
    }
}

impl KnowledgeBase {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read knowledge file {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("failed to parse knowledge file {}", path.display()))
    }

    /// Route data for exactly this direction of travel.
    pub fn route(&self, task: TaskKind, from: &str, to: &str) -> Option<&RouteInfo> {
        let routes = match task {
            TaskKind::TrainBooking => &self.train_routes,
            TaskKind::BusBooking => &self.bus_routes,
        };
        routes
            .iter()
            .find(|route| route.from.eq_ignore_ascii_case(from) && route.to.eq_ignore_ascii_case(to))
    }

    pub fn train_class(&self, code: &str) -> Option<&ClassInfo> {
        self.train_classes
            .iter()
            .find(|class| class.code.eq_ignore_ascii_case(code))
    }

    pub fn bus_type(&self, name: &str) -> Option<&BusTypeInfo> {
        self.bus_types
            .iter()
            .find(|bus_type| bus_type.name.eq_ignore_ascii_case(name))
    }

    pub fn operator(&self, name: &str) -> Option<&OperatorInfo> {
        self.operators
            .iter()
            .find(|operator| operator.name.eq_ignore_ascii_case(name))
    }

    pub fn platform(&self, task: TaskKind) -> &PlatformInfo {
        match task {
            TaskKind::TrainBooking => &self.train_platform,
            TaskKind::BusBooking => &self.bus_platform,
        }
    }

    /// Distance times the per-km rate of the chosen class or bus type, in whole rupees.
    pub fn fare_estimate(&self, task: TaskKind, route: &RouteInfo, option: &str) -> Option<u32> {
        let rate = match task {
            TaskKind::TrainBooking => self.train_class(option)?.fare_per_km,
            TaskKind::BusBooking => self.bus_type(option)?.fare_per_km,
        };
        Some((f64::from(route.distance_km) * rate) as u32)
    }

    /// Tips for a travel topic. Booking and class questions are answered from other tables.
    pub fn tips(&self, subject: HelpSubject) -> &[String] {
        match subject {
            HelpSubject::Tatkal => &self.travel_tips.tatkal,
            HelpSubject::PremiumTatkal => &self.travel_tips.premium_tatkal,
            HelpSubject::Overnight => &self.travel_tips.overnight,
            HelpSubject::LongDistance => &self.travel_tips.long_distance,
            HelpSubject::Booking | HelpSubject::Classes => &[],
        }
    }

    pub fn builtin() -> Self {
        Self {
            train_routes: vec![
                route(
                    "Delhi",
                    "Mumbai",
                    1384,
                    "15-17 hours",
                    &["Rajdhani Express", "August Kranti Rajdhani", "Mumbai Rajdhani"],
                    LONG_HAUL_CLASSES,
                ),
                route(
                    "Mumbai",
                    "Delhi",
                    1384,
                    "15-17 hours",
                    &["New Delhi Rajdhani", "August Kranti Rajdhani", "Paschim Express"],
                    LONG_HAUL_CLASSES,
                ),
                route(
                    "Bangalore",
                    "Chennai",
                    362,
                    "4-6 hours",
                    &["Shatabdi Express", "Brindavan Express", "Lalbagh Express"],
                    DAY_CLASSES,
                ),
                route(
                    "Chennai",
                    "Bangalore",
                    362,
                    "4-6 hours",
                    &["Shatabdi Express", "Brindavan Express", "Lalbagh Express"],
                    DAY_CLASSES,
                ),
                route(
                    "Delhi",
                    "Kolkata",
                    1472,
                    "17-19 hours",
                    &["Rajdhani Express", "Duronto Express", "Poorva Express"],
                    LONG_HAUL_CLASSES,
                ),
            ],
            bus_routes: vec![
                route(
                    "Bangalore",
                    "Chennai",
                    347,
                    "6-8 hours",
                    &["VRL Travels", "SRS Travels", "Kallada Travels"],
                    SLEEPER_BUSES,
                ),
                route(
                    "Chennai",
                    "Bangalore",
                    347,
                    "6-8 hours",
                    &["VRL Travels", "SRS Travels", "Parveen Travels"],
                    SLEEPER_BUSES,
                ),
                route(
                    "Mumbai",
                    "Pune",
                    148,
                    "3-4 hours",
                    &["Shivneri", "Neeta Travels", "VRL Travels"],
                    SEATER_BUSES,
                ),
                route(
                    "Pune",
                    "Mumbai",
                    148,
                    "3-4 hours",
                    &["Shivneri", "Neeta Travels", "VRL Travels"],
                    SEATER_BUSES,
                ),
                route(
                    "Delhi",
                    "Jaipur",
                    280,
                    "5-6 hours",
                    &["RSRTC", "Raj National Express", "Pink City Express"],
                    SEATER_BUSES,
                ),
                route(
                    "Hyderabad",
                    "Bangalore",
                    569,
                    "8-10 hours",
                    &["Orange Travels", "SRS Travels", "Jabbar Travels"],
                    &["AC Sleeper", "Non-AC Sleeper", "Multi-Axle"],
                ),
            ],
            train_classes: vec![
                class(
                    "1AC",
                    "First AC",
                    "Air-conditioned first class with 2 berths per compartment",
                    &["AC", "Bedding", "Meals", "Privacy"],
                    3.5,
                ),
                class(
                    "2AC",
                    "Second AC",
                    "Air-conditioned with 4 berths per compartment",
                    &["AC", "Bedding", "Curtains"],
                    2.5,
                ),
                class(
                    "3AC",
                    "Third AC",
                    "Air-conditioned with 6 berths per compartment",
                    &["AC", "Bedding"],
                    1.8,
                ),
                class(
                    "SL",
                    "Sleeper",
                    "Non-AC sleeper with 6 berths per compartment",
                    &["Fan", "Basic seating"],
                    0.8,
                ),
                class(
                    "CC",
                    "Chair Car",
                    "Air-conditioned seating",
                    &["AC", "Comfortable seats"],
                    1.2,
                ),
                class(
                    "EC",
                    "Executive Chair Car",
                    "Premium air-conditioned seating",
                    &["AC", "Premium seats", "More legroom"],
                    2.0,
                ),
            ],
            bus_types: vec![
                bus_type(
                    "AC Sleeper",
                    "Air-conditioned bus with sleeping berths",
                    &["AC", "Sleeping berths", "Blanket", "Pillow"],
                    "Overnight journeys",
                    2.5,
                ),
                bus_type(
                    "Non-AC Sleeper",
                    "Non-AC bus with sleeping berths",
                    &["Sleeping berths", "Fan", "Basic comfort"],
                    "Budget overnight travel",
                    1.5,
                ),
                bus_type(
                    "AC Semi-Sleeper",
                    "AC bus with reclining seats",
                    &["AC", "Reclining seats", "More legroom"],
                    "Day and night journeys",
                    2.0,
                ),
                bus_type(
                    "Volvo AC",
                    "Premium AC bus with comfortable seating",
                    &["AC", "Comfortable seats", "Entertainment", "USB charging"],
                    "Comfortable day travel",
                    2.2,
                ),
                bus_type(
                    "Multi-Axle",
                    "Large bus with multiple axles for stability",
                    &["Spacious", "Stable ride"],
                    "Long distance travel",
                    1.8,
                ),
                bus_type(
                    "AC",
                    "Standard air-conditioned seater",
                    &["AC", "Push-back seats"],
                    "Short day trips",
                    2.0,
                ),
                bus_type(
                    "Non-AC",
                    "Standard non-AC seater",
                    &["Fan", "Basic seating"],
                    "Budget short trips",
                    1.2,
                ),
            ],
            operators: vec![
                operator("VRL Travels", 4.2, "Wide network, reliable service"),
                operator("SRS Travels", 4.0, "South India routes, good timing"),
                operator("Kallada Travels", 4.1, "Kerala routes, comfortable buses"),
                operator("Shivneri", 4.3, "Maharashtra state transport, punctual"),
            ],
            train_platform: PlatformInfo {
                name: "IRCTC".to_string(),
                website: "https://www.irctc.co.in".to_string(),
                helpline: "139 (Railway Enquiry)".to_string(),
                steps: strings(&[
                    "Log in to your IRCTC account",
                    "Enter journey details (From, To, Date)",
                    "Search for available trains",
                    "Select train and class",
                    "Enter passenger details",
                    "Make payment and download the e-ticket",
                ]),
                tips: strings(&[
                    "Book up to 120 days in advance for better availability",
                    "Keep your ID proof ready (Aadhaar, PAN, etc.)",
                    "Check train running status before travel",
                ]),
            },
            bus_platform: PlatformInfo {
                name: "Redbus".to_string(),
                website: "https://www.redbus.in".to_string(),
                helpline: "1800-102-6666".to_string(),
                steps: strings(&[
                    "Enter source and destination cities",
                    "Select travel date and search buses",
                    "Filter by timing, bus type and operator",
                    "Choose seats and boarding/dropping points",
                    "Enter passenger details and pay",
                ]),
                tips: strings(&[
                    "Window seats usually end with 1 or 6",
                    "Front rows have less vibration",
                    "Arrive at the boarding point 15 minutes early",
                ]),
            },
            travel_tips: TravelTips {
                tatkal: strings(&[
                    "Tatkal booking opens at 10 AM for AC classes, 11 AM for non-AC",
                    "Keep passenger details pre-filled in your master list",
                    "Have your payment method ready before the window opens",
                    "Book exactly at opening time for better chances",
                    "Tatkal tickets are non-refundable",
                ]),
                premium_tatkal: strings(&[
                    "Premium Tatkal costs more but has better availability",
                    "Fares rise as seats fill up",
                    "Booking opens at the same time as regular Tatkal",
                    "Premium Tatkal tickets are non-refundable",
                    "A good option for last-minute travel",
                ]),
                overnight: strings(&[
                    "Choose sleeper buses for overnight journeys",
                    "Lower berths are easier to access",
                    "Carry a light blanket even in AC buses",
                    "Keep valuables secure while sleeping",
                    "Check if meals are provided or carry snacks",
                ]),
                long_distance: strings(&[
                    "Choose buses with good suspension (Volvo, Multi-Axle)",
                    "Book seats in the front half for less vibration",
                    "Keep snacks and water handy",
                    "Stretch your legs during stops",
                    "Check for charging points if needed",
                ]),
            },
        }
    }
}

const LONG_HAUL_CLASSES: &[&str] = &["1AC", "2AC", "3AC", "SL"];
const DAY_CLASSES: &[&str] = &["CC", "EC", "2AC", "SL"];
const SLEEPER_BUSES: &[&str] = &["AC Sleeper", "Non-AC Sleeper", "AC Semi-Sleeper"];
const SEATER_BUSES: &[&str] = &["AC", "Non-AC", "Volvo AC"];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn route(
    from: &str,
    to: &str,
    distance_km: u32,
    duration: &str,
    services: &[&str],
    options: &[&str],
) -> RouteInfo {
    RouteInfo {
        from: from.to_string(),
        to: to.to_string(),
        distance_km,
        duration: duration.to_string(),
        services: strings(services),
        options: strings(options),
    }
}

fn class(
    code: &str,
    name: &str,
    description: &str,
    amenities: &[&str],
    fare_per_km: f64,
) -> ClassInfo {
    ClassInfo {
        code: code.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        amenities: strings(amenities),
        fare_per_km,
    }
}

fn bus_type(
    name: &str,
    description: &str,
    amenities: &[&str],
    best_for: &str,
    fare_per_km: f64,
) -> BusTypeInfo {
    BusTypeInfo {
        name: name.to_string(),
        description: description.to_string(),
        amenities: strings(amenities),
        best_for: best_for.to_string(),
        fare_per_km,
    }
}

fn operator(name: &str, rating: f32, speciality: &str) -> OperatorInfo {
    OperatorInfo {
        name: name.to_string(),
        rating,
        speciality: speciality.to_string(),
    }
}
