//! Plan-expansion directives.
//!
//! A [`Transform`] on a template target describes how [`Plan::expand`]
//! multiplies it into concrete targets.
//!
//! [`Plan::expand`]: crate::Plan::expand

/// Where a parameter's values come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamValues {
    /// Literal values.
    Literal(Vec<String>),
    /// The member names of a previously expanded group, in enumeration order.
    Group(String),
}

/// One named parameter of a `map` or `cross`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    /// Parameter name, used for `${name}` placeholders and [`Inputs::param`].
    ///
    /// [`Inputs::param`]: crate::Inputs::param
    pub name: String,
    /// Source of the values.
    pub values: ParamValues,
}

impl Param {
    /// A parameter over literal values.
    pub fn values<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: ParamValues::Literal(values.into_iter().map(Into::into).collect()),
        }
    }

    /// A parameter ranging over the members of `group`, named after the group.
    pub fn group(group: impl Into<String>) -> Self {
        let group = group.into();
        Self {
            name: group.clone(),
            values: ParamValues::Group(group),
        }
    }
}

/// How a template target expands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transform {
    /// Co-varying parameters, zipped element-wise.
    Map(Vec<Param>),
    /// Cartesian product, first parameter varying slowest.
    Cross(Vec<Param>),
    /// Aggregate the members of a group into one target, or one per distinct
    /// value of `by`.
    Combine {
        /// Group to combine.
        group: String,
        /// Optional parameter to partition members by.
        by: Option<String>,
    },
}

impl Transform {
    /// Shorthand for [`Transform::Combine`] without partitioning.
    pub fn combine(group: impl Into<String>) -> Self {
        Transform::Combine {
            group: group.into(),
            by: None,
        }
    }

    /// Shorthand for [`Transform::Combine`] partitioned by `param`.
    pub fn combine_by(group: impl Into<String>, param: impl Into<String>) -> Self {
        Transform::Combine {
            group: group.into(),
            by: Some(param.into()),
        }
    }

    /// Lowercase keyword of this transform.
    pub fn keyword(&self) -> &'static str {
        match self {
            Transform::Map(_) => "map",
            Transform::Cross(_) => "cross",
            Transform::Combine { .. } => "combine",
        }
    }
}
