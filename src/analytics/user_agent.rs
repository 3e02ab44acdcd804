//! User-Agent classification via `woothee`

use woothee::parser::Parser;

use crate::models::{ClientAgent, DeviceClass, UNKNOWN_CLIENT};

/// Value woothee reports for fields it cannot determine
const WOOTHEE_UNKNOWN: &str = "UNKNOWN";

/// Classify a raw `User-Agent` header value.
///
/// Empty or unrecognisable input yields `unknown`/`unknown`/desktop. Only
/// handheld categories can be mobile or tablet; everything else is desktop.
pub fn classify(user_agent: &str) -> ClientAgent {
    let user_agent = user_agent.trim();
    if user_agent.is_empty() {
        return ClientAgent::unknown();
    }

    let Some(parsed) = Parser::new().parse(user_agent) else {
        return ClientAgent::unknown();
    };

    let device = match parsed.category {
        "smartphone" | "mobilephone" if is_tablet(user_agent, parsed.os) => DeviceClass::Tablet,
        "smartphone" | "mobilephone" => DeviceClass::Mobile,
        _ => DeviceClass::Desktop,
    };

    ClientAgent {
        browser: family(parsed.name),
        os: family(parsed.os),
        device,
    }
}

// woothee files tablets under "smartphone"; only consulted for handhelds
fn is_tablet(user_agent: &str, os: &str) -> bool {
    os == "iPad"
        || user_agent.contains("Tablet")
        || (os == "Android" && !user_agent.contains("Mobile"))
}

fn family(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() || name == WOOTHEE_UNKNOWN {
        UNKNOWN_CLIENT.to_string()
    } else {
        name.to_string()
    }
}
