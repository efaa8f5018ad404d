mod article;
mod rating;
mod user;

pub use article::{Article, ArticleFilter, ArticleUpdate, Category, NewArticle, ParseCategoryError};
pub use rating::{Neighbor, RateRequest, Rating, RatingOutcome, RatingSummary};
pub use user::{LoginRequest, LoginResponse, NewUser, RegisterRequest, Session, User, UserProfile};
