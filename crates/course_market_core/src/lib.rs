pub mod checkout;
pub mod domain;
pub mod ports;
pub mod progress;

pub use checkout::{
    CheckoutOrchestrator, CheckoutSettings, CheckoutStarted, ConfirmationOutcome,
    PurchaseStatusView,
};
pub use domain::{
    Course, CourseDetails, CourseSearch, CourseUpdate, Lecture, LectureProgress, LectureUpdate,
    NewCourse, NewLecture, NewUser, PriceSort, ProgressRecord, Purchase, PurchaseStatus,
    PurchasedCourse, Role, UpsertOutcome, User, UserCredentials,
};
pub use ports::{
    CheckoutRequest, CheckoutSession, DatabaseService, PaymentEvent, PaymentService, PortError,
    PortResult,
};
pub use progress::{CompletionResult, CourseProgress, LectureViewResult, ProgressOrchestrator};
