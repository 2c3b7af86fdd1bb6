//! Typed extension registry
//!
//! An [`Extensions<T>`] holds every registered implementation of one
//! capability (`T` is usually `dyn SomeTrait`). Components register
//! explicitly when they are constructed and unregister when torn down;
//! nothing is discovered implicitly.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub struct Extensions<T: ?Sized> {
    members: RefCell<Vec<Rc<T>>>,
}

impl<T: ?Sized> Extensions<T> {
    pub fn new() -> Self {
        Self {
            members: RefCell::new(Vec::new()),
        }
    }

    /// Register an implementation. Registering the same instance twice is a no-op.
    ///
    /// Returns `true` if the instance was added.
    pub fn register(&self, member: Rc<T>) -> bool {
        let mut members = self.members.borrow_mut();
        if members.iter().any(|m| same_instance(m, &member)) {
            return false;
        }
        members.push(member);
        true
    }

    /// Unregister an implementation. Unknown instances are ignored.
    ///
    /// Returns `true` if the instance was removed.
    pub fn unregister(&self, member: &Rc<T>) -> bool {
        let mut members = self.members.borrow_mut();
        let before = members.len();
        members.retain(|m| !same_instance(m, member));
        members.len() != before
    }

    /// Current members, in registration order
    ///
    /// The snapshot is detached from the registry, so members may register
    /// or unregister while the caller iterates it.
    pub fn snapshot(&self) -> Vec<Rc<T>> {
        self.members.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.borrow().is_empty()
    }
}

impl<T: ?Sized> Default for Extensions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Extensions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("members", &self.len())
            .finish()
    }
}

// Compare data pointers only; vtable pointers of the same object may differ
// between codegen units.
fn same_instance<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
