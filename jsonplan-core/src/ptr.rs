//! Type-erased pointers.
//!
//! The codec addresses values through these wrappers: a schema node knows the
//! byte offset of a field inside its owner, and the engine walks from an
//! opaque base address to the field with [`PtrMut::field`]. None of these
//! types carry a lifetime; the caller is responsible for keeping the pointee
//! alive and correctly typed.

use core::fmt;

/// A type-erased, mutable, initialized pointer.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PtrMut(*mut u8);

impl fmt::Debug for PtrMut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PtrMut({:p})", self.0)
    }
}

impl PtrMut {
    /// Wraps a raw pointer to a sized value.
    #[inline]
    pub const fn new<T>(ptr: *mut T) -> Self {
        Self(ptr as *mut u8)
    }

    /// Wraps a mutable reference.
    #[inline]
    pub fn from_mut<T>(value: &mut T) -> Self {
        Self::new(value as *mut T)
    }

    /// Returns the address as a byte pointer.
    #[inline]
    pub const fn as_mut_byte_ptr(self) -> *mut u8 {
        self.0
    }

    /// Read-only view of the same address.
    #[inline]
    pub const fn as_const(self) -> PtrConst {
        PtrConst(self.0)
    }

    /// Uninitialized view of the same address (for re-initialisation after a move).
    #[inline]
    pub const fn as_uninit(self) -> PtrUninit {
        PtrUninit(self.0)
    }

    /// Returns a pointer `offset` bytes past this one.
    ///
    /// # Safety
    /// `offset` must stay within the allocation this pointer belongs to.
    #[inline]
    pub unsafe fn field(self, offset: usize) -> PtrMut {
        PtrMut(unsafe { self.0.add(offset) })
    }

    /// Casts to a typed raw pointer.
    ///
    /// # Safety
    /// `T` must be the type actually stored at this address.
    #[inline]
    pub const unsafe fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    /// Borrows the pointee mutably.
    ///
    /// # Safety
    /// - `T` must be the type actually stored at this address
    /// - the value must be initialized and not aliased for `'a`
    #[inline]
    pub unsafe fn as_mut<'a, T>(self) -> &'a mut T {
        unsafe { &mut *(self.0 as *mut T) }
    }

    /// Borrows the pointee.
    ///
    /// # Safety
    /// Same requirements as [`PtrMut::as_mut`], minus exclusivity.
    #[inline]
    pub unsafe fn get<'a, T>(self) -> &'a T {
        unsafe { &*(self.0 as *const T) }
    }

    /// Moves the pointee out, leaving the memory logically uninitialized.
    ///
    /// # Safety
    /// `T` must be the type stored here; the caller must not drop the
    /// original afterwards.
    #[inline]
    pub unsafe fn read<T>(self) -> T {
        unsafe { core::ptr::read(self.0 as *const T) }
    }
}

/// A type-erased, read-only, initialized pointer.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PtrConst(*const u8);

impl fmt::Debug for PtrConst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PtrConst({:p})", self.0)
    }
}

impl PtrConst {
    /// Wraps a raw pointer to a sized value.
    #[inline]
    pub const fn new<T>(ptr: *const T) -> Self {
        Self(ptr as *const u8)
    }

    /// Wraps a shared reference.
    #[inline]
    pub fn from_ref<T>(value: &T) -> Self {
        Self::new(value as *const T)
    }

    /// Returns the address as a byte pointer.
    #[inline]
    pub const fn as_byte_ptr(self) -> *const u8 {
        self.0
    }

    /// Returns a pointer `offset` bytes past this one.
    ///
    /// # Safety
    /// `offset` must stay within the allocation this pointer belongs to.
    #[inline]
    pub unsafe fn field(self, offset: usize) -> PtrConst {
        PtrConst(unsafe { self.0.add(offset) })
    }

    /// Casts to a typed raw pointer.
    ///
    /// # Safety
    /// `T` must be the type actually stored at this address.
    #[inline]
    pub const unsafe fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    /// Borrows the pointee.
    ///
    /// # Safety
    /// - `T` must be the type actually stored at this address
    /// - the value must be initialized and outlive `'a`
    #[inline]
    pub unsafe fn get<'a, T>(self) -> &'a T {
        unsafe { &*(self.0 as *const T) }
    }
}

/// A type-erased pointer to memory that is about to be initialized.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PtrUninit(*mut u8);

impl fmt::Debug for PtrUninit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PtrUninit({:p})", self.0)
    }
}

impl PtrUninit {
    /// Wraps a raw pointer to (possibly uninitialized) storage.
    #[inline]
    pub const fn new<T>(ptr: *mut T) -> Self {
        Self(ptr as *mut u8)
    }

    /// Returns the address as a byte pointer.
    #[inline]
    pub const fn as_mut_byte_ptr(self) -> *mut u8 {
        self.0
    }

    /// Writes `value` and returns the now-initialized pointer.
    ///
    /// # Safety
    /// The storage must be valid for writes of `T` and suitably aligned.
    /// Whatever was there before is overwritten without being dropped.
    #[inline]
    pub unsafe fn put<T>(self, value: T) -> PtrMut {
        unsafe {
            core::ptr::write(self.0 as *mut T, value);
            self.assume_init()
        }
    }

    /// Asserts the storage has been initialized.
    ///
    /// # Safety
    /// The memory must actually be initialized.
    #[inline]
    pub const unsafe fn assume_init(self) -> PtrMut {
        PtrMut(self.0)
    }
}

impl From<PtrMut> for PtrConst {
    #[inline]
    fn from(p: PtrMut) -> Self {
        p.as_const()
    }
}

impl From<PtrMut> for PtrUninit {
    #[inline]
    fn from(p: PtrMut) -> Self {
        p.as_uninit()
    }
}
