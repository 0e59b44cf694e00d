use std::rc::Rc;

/// A live child: its configuration and the instance the factory built.
pub struct CreatedChild<C, T> {
    pub configuration: C,
    pub instance: Rc<T>,
}

impl<C: Clone, T> Clone for CreatedChild<C, T> {
    fn clone(&self) -> Self {
        Self {
            configuration: self.configuration.clone(),
            instance: Rc::clone(&self.instance),
        }
    }
}

/// One entry of a router snapshot.
pub enum Child<C, T> {
    Created(CreatedChild<C, T>),
    /// Kept in the navigation state with `Status::Destroyed`: no instance,
    /// saved state retained.
    Destroyed { configuration: C },
}

impl<C: Clone, T> Clone for Child<C, T> {
    fn clone(&self) -> Self {
        match self {
            Child::Created(created) => Child::Created(created.clone()),
            Child::Destroyed { configuration } => Child::Destroyed {
                configuration: configuration.clone(),
            },
        }
    }
}

impl<C, T> Child<C, T> {
    pub fn configuration(&self) -> &C {
        match self {
            Child::Created(created) => &created.configuration,
            Child::Destroyed { configuration } => configuration,
        }
    }

    pub fn as_created(&self) -> Option<&CreatedChild<C, T>> {
        match self {
            Child::Created(created) => Some(created),
            Child::Destroyed { .. } => None,
        }
    }

    pub fn instance(&self) -> Option<&Rc<T>> {
        self.as_created().map(|c| &c.instance)
    }
}

/// Looks a live child up by configuration.
pub fn find_created<C: PartialEq + Clone, T>(
    children: &[Child<C, T>],
    configuration: &C,
) -> Option<CreatedChild<C, T>> {
    children
        .iter()
        .filter_map(Child::as_created)
        .find(|c| &c.configuration == configuration)
        .cloned()
}
