//! Capital cities covered by the research phase.

/// One in-scope capital and the codes used to refer to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapitalCity {
    pub state_code: &'static str,
    pub state_name: &'static str,
    pub city_code: &'static str,
    pub city_name: &'static str,
    /// ABS Greater Capital City Statistical Area code
    pub gccsa_code: &'static str,
}

pub const CAPITALS: [CapitalCity; 4] = [
    CapitalCity {
        state_code: "NSW",
        state_name: "New South Wales",
        city_code: "SYD",
        city_name: "Sydney",
        gccsa_code: "1GSYD",
    },
    CapitalCity {
        state_code: "VIC",
        state_name: "Victoria",
        city_code: "MEL",
        city_name: "Melbourne",
        gccsa_code: "2GMEL",
    },
    CapitalCity {
        state_code: "QLD",
        state_name: "Queensland",
        city_code: "BNE",
        city_name: "Brisbane",
        gccsa_code: "3GBRI",
    },
    CapitalCity {
        state_code: "SA",
        state_name: "South Australia",
        city_code: "ADL",
        city_name: "Adelaide",
        gccsa_code: "4GADE",
    },
];

impl CapitalCity {
    /// Look up by state code, city code or GCCSA code (case-insensitive)
    pub fn lookup(code: &str) -> Option<&'static CapitalCity> {
        let code = code.trim();
        CAPITALS.iter().find(|c| {
            c.state_code.eq_ignore_ascii_case(code)
                || c.city_code.eq_ignore_ascii_case(code)
                || c.gccsa_code.eq_ignore_ascii_case(code)
        })
    }

    /// Capital of a state given its full name
    pub fn of_state(state_name: &str) -> Option<&'static CapitalCity> {
        let state_name = state_name.trim();
        CAPITALS
            .iter()
            .find(|c| c.state_name.eq_ignore_ascii_case(state_name))
    }
}

/// GCCSA codes of every in-scope capital
pub fn gccsa_codes() -> Vec<String> {
    CAPITALS.iter().map(|c| c.gccsa_code.to_string()).collect()
}
